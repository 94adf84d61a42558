use crate::url::Linker;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "tipsite.yaml";

fn default_title() -> String {
    String::from("Tips of the Week")
}

fn default_source_directory() -> PathBuf {
    PathBuf::from("tips")
}

#[derive(Deserialize)]
struct Project {
    site_root: Url,

    #[serde(default = "default_title")]
    title: String,

    #[serde(default)]
    home_page: String,

    #[serde(default = "default_source_directory")]
    source_directory: PathBuf,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    tip_template: Vec<PathBuf>,
}

/// Everything a build needs to know, with all paths made absolute relative to
/// the project file and all URLs resolved against the site root.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub source_directory: PathBuf,
    pub site_root: Url,
    pub home_page: Url,
    pub static_url: Url,
    pub theme_directory: PathBuf,
    pub index_template: Vec<PathBuf>,
    pub tip_template: Vec<PathBuf>,

    /// The theme's `static` directory, if it has one.
    pub static_source_directory: Option<PathBuf>,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file and
    /// loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration from `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        let theme_dir = project_root.join("theme");
        let theme: Theme =
            serde_yaml::from_reader(open(&theme_dir.join("theme.yaml"), "theme")?)?;
        let static_source_directory = theme_dir.join("static");

        let linker = Linker::new(project.site_root);
        let site_root = linker.index_url().clone();
        Ok(Config {
            title: project.title,
            source_directory: project_root.join(project.source_directory),
            home_page: site_root.join(&project.home_page)?,
            static_url: site_root.join("static/")?,
            site_root,
            index_template: theme
                .index_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            tip_template: theme
                .tip_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            static_source_directory: if static_source_directory.is_dir() {
                Some(static_source_directory)
            } else {
                None
            },
            theme_directory: theme_dir,
        })
    }
}

fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}
