//! Feed documents on the local file system.
//!
//! Each feed lives at `<root>/<name>.xml`. An icon placed beside it as
//! `<root>/<name>.ico` is referenced from the channel image when the
//! document is first created.

use super::channel::{Channel, ChannelImage};
use crate::error::SitefeedError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct FsFeedStore {
    root: PathBuf,
}

impl FsFeedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.xml"))
    }

    fn icon_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.ico"))
    }

    /// `file://` URI of the feed document.
    pub fn document_uri(&self, name: &str) -> String {
        file_uri(&self.document_path(name))
    }

    /// Load the document `name`, creating and saving it first if it does not exist.
    #[instrument(level = "info", skip(self, description, link))]
    pub async fn load_or_init(
        &self,
        name: &str,
        title: &str,
        description: &str,
        link: &str,
    ) -> Result<Channel, SitefeedError> {
        let path = self.document_path(name);
        if fs::try_exists(&path).await? {
            return self.load(name).await;
        }

        let icon = self.icon_path(name);
        let image = if fs::try_exists(&icon).await? {
            Some(ChannelImage {
                title: title.to_string(),
                link: link.to_string(),
                url: file_uri(&icon),
            })
        } else {
            None
        };
        let channel = Channel::new(title, description, link, image.as_ref())?;
        self.save(name, &channel).await?;
        info!(path = %path.display(), "Created feed document");
        Ok(channel)
    }

    pub async fn load(&self, name: &str) -> Result<Channel, SitefeedError> {
        let path = self.document_path(name);
        let xml = fs::read_to_string(&path).await?;
        let channel = Channel::parse(&xml, name)?;
        debug!(
            path = %path.display(),
            title = channel.title().unwrap_or_default(),
            items = channel.items().len(),
            "Read feed document"
        );
        Ok(channel)
    }

    pub async fn save(&self, name: &str, channel: &Channel) -> Result<(), SitefeedError> {
        let path = self.document_path(name);
        fs::write(&path, channel.to_xml()).await?;
        debug!(path = %path.display(), items = channel.items().len(), "Wrote feed document");
        Ok(())
    }
}

fn file_uri(path: &Path) -> String {
    std::path::absolute(path)
        .ok()
        .and_then(|abs| Url::from_file_path(abs).ok())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}
