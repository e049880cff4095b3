//! One YAML document per guild holding every persisted collection.
//!
//! Writes are applied to a copy of the document, written to a temporary
//! file and renamed over the original; the in-memory document only changes
//! once the rename succeeded.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use command_core::{GuildStoreFactory, GuildStores};
use policy_core::{BackingStore, CooldownRule, CustomCommand, Keyed, Keyword, PermissionRule};
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct GuildDocument {
    permissions: BTreeMap<String, PermissionRule>,
    cooldowns: BTreeMap<String, CooldownRule>,
    commands: BTreeMap<String, CustomCommand>,
    keywords: BTreeMap<String, Keyword>,
}

#[derive(Debug)]
struct GuildFile {
    path: PathBuf,
    doc: Mutex<GuildDocument>,
}

impl GuildFile {
    async fn open(path: PathBuf, seed: &[PermissionRule]) -> Result<Self> {
        let doc = match fs::read_to_string(&path).await {
            Ok(yaml) => serde_yaml::from_str(&yaml)
                .with_context(|| format!("parsing guild store at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut doc = GuildDocument::default();
                for rule in seed {
                    doc.permissions.insert(rule.action.clone(), rule.clone());
                }
                write_atomically(&path, &doc).await?;
                info!(path = %path.display(), seeded = seed.len(), "Created guild store");
                doc
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading guild store at {}", path.display()));
            }
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    async fn read<T>(&self, f: impl FnOnce(&GuildDocument) -> T) -> T {
        f(&*self.doc.lock().await)
    }

    /// Applies `f` to a copy of the document and persists the copy.
    async fn write<T>(&self, f: impl FnOnce(&mut GuildDocument) -> T) -> Result<T> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        let out = f(&mut next);
        write_atomically(&self.path, &next).await?;
        *doc = next;
        debug!(path = %self.path.display(), "Guild store written");
        Ok(out)
    }
}

async fn write_atomically(path: &Path, doc: &GuildDocument) -> Result<()> {
    let yaml = serde_yaml::to_string(doc).context("serializing guild store")?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, yaml)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))
}

type Select<V> = fn(&GuildDocument) -> &BTreeMap<String, V>;
type SelectMut<V> = fn(&mut GuildDocument) -> &mut BTreeMap<String, V>;

/// One collection of a guild document.
struct Collection<V> {
    file: Arc<GuildFile>,
    select: Select<V>,
    select_mut: SelectMut<V>,
}

#[async_trait]
impl<V> BackingStore<V> for Collection<V>
where
    V: Keyed + Clone + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Vec<V>> {
        Ok(self.file.read(|doc| (self.select)(doc).values().cloned().collect()).await)
    }

    async fn load_one(&self, key: &str) -> Result<Option<V>> {
        Ok(self.file.read(|doc| (self.select)(doc).get(key).cloned()).await)
    }

    async fn upsert(&self, value: &V) -> Result<bool> {
        let row = value.clone();
        self.file
            .write(|doc| {
                (self.select_mut)(doc).insert(row.key().to_owned(), row);
            })
            .await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.file
            .write(|doc| (self.select_mut)(doc).remove(key).is_some())
            .await
    }
}

fn collection<V: Keyed + Clone + Send + Sync + 'static>(
    file: &Arc<GuildFile>,
    select: Select<V>,
    select_mut: SelectMut<V>,
) -> Arc<dyn BackingStore<V>> {
    Arc::new(Collection {
        file: Arc::clone(file),
        select,
        select_mut,
    })
}

/// Opens `<dir>/<guild>.yaml` for each guild.
#[derive(Debug, Clone)]
pub(crate) struct YamlStoreFactory {
    dir: PathBuf,
    default_permissions: Vec<PermissionRule>,
}

impl YamlStoreFactory {
    pub(crate) fn new(dir: impl Into<PathBuf>, default_permissions: Vec<PermissionRule>) -> Self {
        Self {
            dir: dir.into(),
            default_permissions,
        }
    }

    fn path_for(&self, guild_id: &str) -> PathBuf {
        let name: String = guild_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.yaml"))
    }
}

#[async_trait]
impl GuildStoreFactory for YamlStoreFactory {
    async fn open(&self, guild_id: &str) -> Result<GuildStores> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating store directory at {}", self.dir.display()))?;
        let file = Arc::new(GuildFile::open(self.path_for(guild_id), &self.default_permissions).await?);
        Ok(GuildStores {
            permissions: collection::<PermissionRule>(&file, |d| &d.permissions, |d| &mut d.permissions),
            cooldowns: collection::<CooldownRule>(&file, |d| &d.cooldowns, |d| &mut d.cooldowns),
            commands: collection::<CustomCommand>(&file, |d| &d.commands, |d| &mut d.commands),
            keywords: collection::<Keyword>(&file, |d| &d.keywords, |d| &mut d.keywords),
        })
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use policy_core::Rank;
    use tempfile::TempDir;

    use super::*;

    fn hug() -> CustomCommand {
        CustomCommand {
            name: "hug".to_owned(),
            template: "{sender} hugs {mentions}".to_owned(),
            owner_id: 7,
        }
    }

    #[tokio::test]
    async fn rows_survive_reopening() {
        let tmp = TempDir::new().unwrap();
        let factory = YamlStoreFactory::new(tmp.path(), Vec::new());

        let stores = factory.open("guild-1").await.unwrap();
        assert!(stores.commands.upsert(&hug()).await.unwrap());
        stores
            .cooldowns
            .upsert(&CooldownRule::new("roll", Duration::from_secs(30)))
            .await
            .unwrap();

        let reopened = factory.open("guild-1").await.unwrap();
        assert_eq!(reopened.commands.load_one("hug").await.unwrap(), Some(hug()));
        assert_eq!(reopened.cooldowns.load_all().await.unwrap().len(), 1);
        assert!(reopened.keywords.load_all().await.unwrap().is_empty());
        assert!(!tmp.path().join("guild-1.yaml.tmp").exists());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let tmp = TempDir::new().unwrap();
        let stores = YamlStoreFactory::new(tmp.path(), Vec::new()).open("g").await.unwrap();
        stores.commands.upsert(&hug()).await.unwrap();
        assert!(stores.commands.delete("hug").await.unwrap());
        assert!(!stores.commands.delete("hug").await.unwrap());
        assert_eq!(stores.commands.load_one("hug").await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_guilds_are_seeded_once() {
        let tmp = TempDir::new().unwrap();
        let seed = vec![PermissionRule::new("perm", Rank::Admin)];
        let factory = YamlStoreFactory::new(tmp.path(), seed.clone());

        let stores = factory.open("g").await.unwrap();
        assert_eq!(stores.permissions.load_all().await.unwrap(), seed);
        assert!(stores.permissions.delete("perm").await.unwrap());

        let reopened = factory.open("g").await.unwrap();
        assert!(reopened.permissions.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guild_ids_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let factory = YamlStoreFactory::new(tmp.path(), Vec::new());
        factory.open("../escape").await.unwrap();
        assert!(tmp.path().join("___escape.yaml").exists());
    }

    #[tokio::test]
    async fn corrupt_documents_fail_to_open() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("g.yaml"), "permissions: [not, a, map").unwrap();
        let factory = YamlStoreFactory::new(tmp.path(), Vec::new());
        assert!(factory.open("g").await.is_err());
    }
}
