use crate::core::archive::ArchiveExtractor;
use crate::core::config::{InstallLayout, InstallOptions};
use crate::core::downloader::Downloader;
use crate::core::events::EventSink;
use crate::core::processor::ToolRunner;

/// Everything a loader front-end needs for one install.
pub struct InstallContext<'a> {
    pub options: &'a InstallOptions,
    pub layout: InstallLayout,
    pub downloader: &'a Downloader,
    pub runner: &'a dyn ToolRunner,
    pub extractor: &'a dyn ArchiveExtractor,
}

impl<'a> InstallContext<'a> {
    pub fn new(
        options: &'a InstallOptions,
        downloader: &'a Downloader,
        runner: &'a dyn ToolRunner,
        extractor: &'a dyn ArchiveExtractor,
    ) -> Self {
        Self {
            options,
            layout: options.layout(),
            downloader,
            runner,
            extractor,
        }
    }

    pub fn events(&self) -> &EventSink {
        self.downloader.events()
    }

    pub fn http(&self) -> &reqwest::Client {
        self.downloader.client()
    }

    pub fn minecraft_version(&self) -> &str {
        &self.options.loader.version
    }
}
