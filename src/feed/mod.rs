//! Duplicate detection and bounded-history merging.
//!
//! # Submodules
//!
//! - [`channel`]: the persisted RSS document model
//! - [`store`]: reading and writing documents on disk

pub mod channel;
pub mod store;

pub use channel::{Channel, ChannelItem};
pub use store::FsFeedStore;

use crate::error::SitefeedError;
use crate::models::Post;
use crate::status::ErrorLog;
use crate::utils::{italic, quote_markup};
use tracing::debug;

/// Decide whether a candidate with `title` and `link` is not yet in `items`.
///
/// Items are scanned newest first. A title match is a duplicate unless
/// `verify_uniqueness` is set, in which case the link must match as well.
/// Items without a title are reported and never match.
pub fn is_new(
    items: &[ChannelItem],
    title: &str,
    link: &str,
    verify_uniqueness: bool,
    feed_title: &str,
    log: &mut ErrorLog,
) -> bool {
    for item in items {
        let Some(existing) = item.title.as_deref() else {
            log.record(format!(
                "Item in {} has no title element:{}",
                italic(feed_title),
                quote_markup(&item.markup)
            ));
            continue;
        };
        if existing.trim() != title {
            continue;
        }
        if !verify_uniqueness {
            debug!(%title, "Title already present");
            return false;
        }
        if item.link.as_deref().map(str::trim) == Some(link) {
            debug!(%title, %link, "Title and link already present");
            return false;
        }
    }
    true
}

/// Prepend `post` and drop the oldest items beyond `keep`.
pub fn merge(channel: &mut Channel, post: &Post, keep: usize) -> Result<(), SitefeedError> {
    let item = ChannelItem::from_post(post)?;
    let items = channel.items_mut();
    items.insert(0, item);
    items.truncate(keep);
    Ok(())
}
