use anypod_core::error::{Error, Result};
use anypod_core::models::{Download, Explicit, Feed};
use anypod_core::path_manager::PathManager;
use rss::extension::itunes::{ITunesCategoryBuilder, ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder, ITunesOwnerBuilder};
use rss::{ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, ItemBuilder};

fn explicit_str(explicit: Explicit) -> &'static str {
    match explicit {
        Explicit::Yes => "yes",
        Explicit::No => "no",
        Explicit::Clean => "clean",
    }
}

/// Renders the RSS XML for one feed's currently `DOWNLOADED` items, ordered
/// newest-first. Pure function over already-loaded rows; callers own
/// fetching the `DOWNLOADED` set and writing the result atomically.
pub fn render_feed_xml(feed: &Feed, downloads: &[Download], paths: &PathManager) -> Result<String> {
    let mut items = Vec::with_capacity(downloads.len());
    for download in downloads {
        let ext = download
            .ext
            .as_deref()
            .ok_or_else(|| Error::DataIntegrity {
                entity: format!("download {}/{}", feed.id, download.id),
                reason: "DOWNLOADED row missing ext while rendering RSS".to_string(),
            })?;
        let media_url = paths.media_url(&feed.id, &download.id, ext)?;
        let mime_type = download.mime_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
        let filesize = download.filesize.unwrap_or(0);

        let enclosure = EnclosureBuilder::default()
            .url(media_url)
            .length(filesize.to_string())
            .mime_type(mime_type)
            .build();

        let guid = GuidBuilder::default().value(download.id.to_string()).permalink(false).build();

        let item_thumbnail = download
            .thumbnail_ext
            .as_deref()
            .map(|ext| paths.image_url(&feed.id, Some(&download.id), ext))
            .transpose()?;

        let mut itunes_item = ITunesItemExtensionBuilder::default();
        itunes_item
            .duration(download.duration.map(|d| d.to_string()))
            .image(item_thumbnail)
            .summary(download.description.clone())
            .episode(download.playlist_index.map(|i| i.to_string()));

        let mut item_builder = ItemBuilder::default();
        item_builder
            .title(Some(download.title.clone()))
            .link(Some(download.source_url.clone()))
            .pub_date(Some(download.published.to_rfc2822()))
            .enclosure(Some(enclosure))
            .guid(Some(guid))
            .itunes_ext(Some(itunes_item.build()));
        if let Some(description) = &download.description {
            item_builder.description(Some(description.clone()));
        }
        items.push(item_builder.build());
    }

    let owner = if feed.author.is_some() || feed.author_email.is_some() {
        Some(
            ITunesOwnerBuilder::default()
                .name(feed.author.clone())
                .email(feed.author_email.clone())
                .build(),
        )
    } else {
        None
    };
    let category = ITunesCategoryBuilder::default().text(feed.category.clone()).build();
    // The `rss` crate's iTunes extension has no `<itunes:type>` field, so
    // `feed.podcast_type` (episodic/serial) has nowhere to render here.
    let mut itunes_channel = ITunesChannelExtensionBuilder::default();
    itunes_channel
        .author(feed.author.clone())
        .categories(vec![category])
        .image(feed.remote_image_url.clone())
        .explicit(Some(explicit_str(feed.explicit).to_string()))
        .subtitle(feed.subtitle.clone())
        .summary(feed.description.clone())
        .owner(owner);

    let mut channel_builder = ChannelBuilder::default();
    channel_builder
        .title(feed.title.clone().unwrap_or_else(|| feed.id.to_string()))
        .link(feed.resolved_url.clone().or_else(|| feed.source_url.clone()).unwrap_or_default())
        .description(feed.description.clone().unwrap_or_default())
        .language(feed.language.clone())
        .itunes_ext(Some(itunes_channel.build()))
        .items(items);

    if let Some(image_url) = &feed.remote_image_url {
        let image = ImageBuilder::default()
            .url(image_url.clone())
            .title(feed.title.clone().unwrap_or_else(|| feed.id.to_string()))
            .link(feed.resolved_url.clone().or_else(|| feed.source_url.clone()).unwrap_or_default())
            .build();
        channel_builder.image(Some(image));
    }

    Ok(channel_builder.build().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anypod_core::models::{DownloadId, DownloadStatus, FeedId};
    use chrono::Utc;

    fn feed() -> Feed {
        let mut f = Feed::new_from_config(FeedId::new("demo").unwrap(), Some("https://example.test".to_string()), Utc::now());
        f.title = Some("Demo Feed".to_string());
        f
    }

    fn downloaded_item(id: &str) -> Download {
        let now = Utc::now();
        let mut d = Download::new_discovered(
            FeedId::new("demo").unwrap(),
            DownloadId::new(id).unwrap(),
            format!("https://example.test/{id}"),
            format!("Episode {id}"),
            now,
            DownloadStatus::Queued,
            now,
        )
        .unwrap();
        d.status = DownloadStatus::Downloaded;
        d.ext = Some("mp4".to_string());
        d.mime_type = Some("video/mp4".to_string());
        d.filesize = Some(1024);
        d.duration = Some(60);
        d.downloaded_at = Some(now);
        d
    }

    #[test]
    fn renders_enclosure_for_downloaded_item() {
        let paths = PathManager::new("/data", "http://example.test");
        let xml = render_feed_xml(&feed(), &[downloaded_item("v1")], &paths).unwrap();
        assert!(xml.contains("http://example.test/media/demo/v1.mp4"));
        assert!(xml.contains("Demo Feed"));
    }

    #[test]
    fn rejects_downloaded_item_missing_ext() {
        let paths = PathManager::new("/data", "http://example.test");
        let mut item = downloaded_item("v1");
        item.ext = None;
        assert!(render_feed_xml(&feed(), &[item], &paths).is_err());
    }

    #[test]
    fn renders_itunes_presentation_fields() {
        let mut f = feed();
        f.author = Some("Demo Author".to_string());
        f.author_email = Some("demo@example.test".to_string());
        f.category = "Technology".to_string();
        f.explicit = anypod_core::models::Explicit::Clean;

        let paths = PathManager::new("/data", "http://example.test");
        let xml = render_feed_xml(&f, &[downloaded_item("v1")], &paths).unwrap();

        assert!(xml.contains("Demo Author"));
        assert!(xml.contains("demo@example.test"));
        assert!(xml.contains("Technology"));
        assert!(xml.contains("clean"));
        assert!(xml.contains("<itunes:duration>60</itunes:duration>"));
    }
}
