// ─── Settings Store ───
// Small `appSettings` XML document holding the installed-version marker,
// pipeline configuration keys and diagnostic paths:
//
//   <configuration>
//     <appSettings>
//       <add key="InstalledVersion" value="v1.2.0"/>
//     </appSettings>
//   </configuration>

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{UpdaterError, UpdaterResult};

/// Well-known keys.
pub mod keys {
    pub const INSTALLED_VERSION: &str = "InstalledVersion";
    pub const LATEST_AVAILABLE_VERSION: &str = "LatestAvailableVersion";
    pub const LAST_CHECKED: &str = "LastChecked";
    pub const DOWNLOAD_FOLDER_PATH: &str = "DownloadFolderPath";
    pub const ZIP_FILE_PATH: &str = "ZipFilePath";
    pub const DESTINATION_PATH: &str = "DestinationPath";

    pub const REPOSITORY_OWNER: &str = "RepositoryOwner";
    pub const REPOSITORY_NAME: &str = "RepositoryName";
    pub const REGISTRY_BASE_URL: &str = "RegistryBaseUrl";
    pub const INSTALL_DIRECTORY: &str = "InstallDirectory";
    pub const STAGING_DIRECTORY: &str = "StagingDirectory";
    pub const ASSET_FILTER: &str = "AssetFilter";
    pub const ARCHIVE_NAME: &str = "ArchiveName";
    pub const RECONCILE_HELPER_PATH: &str = "ReconcileHelperPath";
    pub const COPY_CONCURRENCY: &str = "CopyConcurrency";
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "configuration")]
struct ConfigurationDoc {
    #[serde(rename = "appSettings", default)]
    app_settings: AppSettingsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppSettingsSection {
    #[serde(rename = "add", default)]
    entries: Vec<SettingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingEntry {
    #[serde(rename = "@key")]
    key: String,
    #[serde(rename = "@value", default)]
    value: String,
}

/// Key/value settings persisted as an `appSettings` XML file.
///
/// Keys this crate does not know about are kept and written back untouched.
/// The file may be a full host `.config`: on save only the children of
/// `<appSettings>` are rewritten and every other section is kept as loaded.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    entries: Vec<SettingEntry>,
    /// Document text as loaded; `None` for a store that did not exist.
    document: Option<String>,
}

impl SettingsStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: &Path) -> UpdaterResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, starting empty", path);
                return Ok(Self::empty(path));
            }
            Err(source) => {
                return Err(UpdaterError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let doc: ConfigurationDoc = quick_xml::de::from_str(&raw)?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: doc.app_settings.entries,
            document: Some(raw),
        })
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            document: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value for `key`; the last entry wins when a key is repeated.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Trimmed, non-empty value for `key`.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().rev().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(SettingEntry {
                key: key.to_string(),
                value,
            }),
        }
    }

    pub fn installed_version(&self) -> Option<&str> {
        self.get_non_empty(keys::INSTALLED_VERSION)
    }

    pub fn set_installed_version(&mut self, tag: &str) {
        self.set(keys::INSTALLED_VERSION, tag);
    }

    /// Persist atomically: write a sibling temp file, then rename over.
    pub fn save(&self) -> UpdaterResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| UpdaterError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let xml = match &self.document {
            Some(document) => self.merge_into(document)?,
            None => self.to_xml()?,
        };
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, xml).map_err(|source| UpdaterError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| UpdaterError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {} setting(s) to {:?}", self.entries.len(), self.path);
        Ok(())
    }

    fn to_xml(&self) -> UpdaterResult<String> {
        let doc = ConfigurationDoc {
            app_settings: AppSettingsSection {
                entries: self.entries.clone(),
            },
        };
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut body);
        serializer.indent(' ', 2);
        doc.serialize(serializer)
            .map_err(|e| UpdaterError::Config(format!("cannot serialize settings: {e}")))?;
        Ok(format!("{XML_DECLARATION}{body}\n"))
    }

    /// Copy `document` event by event, replacing the root's `<appSettings>`
    /// with the current entries. A root without one gets it appended.
    fn merge_into(&self, document: &str) -> UpdaterResult<String> {
        let mut reader = Reader::from_str(document);
        let mut writer = Writer::new(Vec::new());
        // Open elements above the current event.
        let mut depth = 0usize;
        // Non-zero while inside the section being replaced.
        let mut skipping = 0usize;
        let mut written = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| UpdaterError::Config(format!("cannot re-read settings: {e}")))?;
            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    if skipping > 0 {
                        skipping += 1;
                    } else if depth == 1 && !written && is_app_settings(&start) {
                        self.write_app_settings(&mut writer)?;
                        written = true;
                        skipping = 1;
                    } else {
                        write_event(&mut writer, Event::Start(start))?;
                        depth += 1;
                    }
                }
                Event::End(end) => {
                    if skipping > 0 {
                        skipping -= 1;
                        continue;
                    }
                    if depth == 1 && !written {
                        self.write_app_settings(&mut writer)?;
                        write_event(&mut writer, Event::Text(BytesText::new("\n")))?;
                        written = true;
                    }
                    write_event(&mut writer, Event::End(end))?;
                    depth = depth.saturating_sub(1);
                }
                Event::Empty(empty) => {
                    if skipping > 0 {
                        continue;
                    }
                    if depth == 1 && !written && is_app_settings(&empty) {
                        self.write_app_settings(&mut writer)?;
                        written = true;
                    } else if depth == 0 && !written {
                        // `<configuration/>`
                        let end = empty.to_end().into_owned();
                        write_event(&mut writer, Event::Start(empty.clone()))?;
                        self.write_app_settings(&mut writer)?;
                        write_event(&mut writer, Event::End(end))?;
                        written = true;
                    } else {
                        write_event(&mut writer, Event::Empty(empty))?;
                    }
                }
                other => {
                    if skipping == 0 {
                        write_event(&mut writer, other)?;
                    }
                }
            }
        }

        if !written {
            return Err(UpdaterError::Config(format!(
                "{:?} has no root element",
                self.path
            )));
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| UpdaterError::Config(format!("settings are not UTF-8: {e}")))
    }

    fn write_app_settings(&self, writer: &mut Writer<Vec<u8>>) -> UpdaterResult<()> {
        write_event(writer, Event::Start(BytesStart::new(APP_SETTINGS)))?;
        for entry in &self.entries {
            write_event(writer, Event::Text(BytesText::new("\n    ")))?;
            let add = BytesStart::new("add").with_attributes([
                ("key", entry.key.as_str()),
                ("value", entry.value.as_str()),
            ]);
            write_event(writer, Event::Empty(add))?;
        }
        write_event(writer, Event::Text(BytesText::new("\n  ")))?;
        write_event(writer, Event::End(BytesEnd::new(APP_SETTINGS)))
    }
}

const APP_SETTINGS: &str = "appSettings";

fn is_app_settings(element: &BytesStart<'_>) -> bool {
    element.name().as_ref() == APP_SETTINGS.as_bytes()
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> UpdaterResult<()> {
    writer
        .write_event(event)
        .map_err(|e| UpdaterError::Config(format!("cannot write settings: {e}")))
}
