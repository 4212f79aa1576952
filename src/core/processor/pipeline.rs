use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::provision::ToolConfig;
use super::runner::ToolRunner;
use crate::core::archive::ArchiveExtractor;
use crate::core::config::InstallLayout;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::events::EventSink;
use crate::core::maven;
use crate::core::profile::{InstallProfile, ProcessorStep, BINPATCH_KEY, CLIENT_SIDE};

const MANIFEST_MEMBER: &str = "META-INF/MANIFEST.MF";

#[cfg(windows)]
const CLASSPATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const CLASSPATH_SEPARATOR: &str = ":";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    /// Every referenced output was already on disk.
    Skipped,
    Running { step: String },
    Completed,
    Failed { step: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Skipped,
    Completed { steps: usize },
}

/// Replays an installer profile's processors, one external process at a time.
pub struct ProcessorPipeline<'a> {
    layout: &'a InstallLayout,
    runner: &'a dyn ToolRunner,
    extractor: &'a dyn ArchiveExtractor,
    events: EventSink,
    state: Mutex<PipelineState>,
}

impl<'a> ProcessorPipeline<'a> {
    pub fn new(
        layout: &'a InstallLayout,
        runner: &'a dyn ToolRunner,
        extractor: &'a dyn ArchiveExtractor,
        events: EventSink,
    ) -> Self {
        Self {
            layout,
            runner,
            extractor,
            events,
            state: Mutex::new(PipelineState::NotStarted),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn library_path(&self, coordinate: &str) -> InstallerResult<PathBuf> {
        Ok(self
            .layout
            .libraries
            .join(maven::resolve(coordinate, None, None)?.local_path()))
    }

    // ── Applied check ───────────────────────────────────

    /// Library files referenced through the data table by client-side steps,
    /// deduplicated in first-seen order. `BINPATCH` is an input, not an output.
    pub fn referenced_outputs(&self, profile: &InstallProfile) -> InstallerResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = Vec::new();
        for step in profile.steps_for(CLIENT_SIDE) {
            for arg in &step.args {
                let Some(key) = data_key(arg) else { continue };
                if key == BINPATCH_KEY {
                    continue;
                }
                let Some(entry) = profile.data.get(key) else {
                    continue;
                };
                let Some(coordinate) = bracketed(&entry.client) else {
                    continue;
                };
                let path = self.library_path(coordinate)?;
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }

    /// True when every referenced output already exists.
    pub fn is_already_applied(&self, profile: &InstallProfile) -> InstallerResult<bool> {
        for file in self.referenced_outputs(profile)? {
            if !file.exists() {
                debug!("Processor output missing: {:?}", file);
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ── Arguments ───────────────────────────────────────

    /// Client patch archive next to the loader's own artifact.
    pub fn binpatch_path(&self, profile: &InstallProfile) -> InstallerResult<PathBuf> {
        let coordinate = profile.universal_coordinate().ok_or_else(|| {
            InstallerError::Loader("Install profile names no loader artifact".into())
        })?;
        let artifact = maven::resolve(coordinate, Some("-clientdata"), Some("lzma"))?;
        Ok(self.layout.libraries.join(artifact.local_path()))
    }

    /// Resolve one templated argument: data table first, then the fixed
    /// placeholders, then a leading `[coordinate]` becomes a library path.
    pub fn resolve_argument(
        &self,
        arg: &str,
        profile: &InstallProfile,
        tools: &ToolConfig,
    ) -> InstallerResult<String> {
        let entry = data_key(arg).and_then(|key| profile.data.get(key).map(|entry| (key, entry)));

        let value = match entry {
            Some((BINPATCH_KEY, _)) => path_string(&self.binpatch_path(profile)?),
            Some((_, entry)) => unquote(&entry.client).to_string(),
            None => self.substitute_placeholders(arg, tools),
        };

        if let Some(rest) = value.strip_prefix('[') {
            if let Some((coordinate, tail)) = rest.split_once(']') {
                return Ok(format!("{}{}", path_string(&self.library_path(coordinate)?), tail));
            }
        }
        Ok(value)
    }

    fn substitute_placeholders(&self, arg: &str, tools: &ToolConfig) -> String {
        let libraries = path_string(&self.layout.libraries);
        let installer = tools
            .installer
            .as_deref()
            .map(path_string)
            .unwrap_or_else(|| libraries.clone());

        arg.replace("{SIDE}", CLIENT_SIDE)
            .replace("{ROOT}", &path_string(&self.layout.root))
            .replace("{MINECRAFT_JAR}", &path_string(&tools.minecraft_jar))
            .replace("{MINECRAFT_VERSION}", &path_string(&tools.minecraft_json))
            .replace("{INSTALLER}", &installer)
            .replace("{LIBRARY_DIR}", &libraries)
    }

    /// `Main-Class` from the jar's manifest.
    pub fn main_class(&self, jar: &Path) -> InstallerResult<String> {
        let manifest = self
            .extractor
            .read_member(jar, MANIFEST_MEMBER)?
            .ok_or_else(|| InstallerError::NoMainClass(jar.to_path_buf()))?;
        parse_main_class(&String::from_utf8_lossy(&manifest))
            .ok_or_else(|| InstallerError::NoMainClass(jar.to_path_buf()))
    }

    // ── Execution ───────────────────────────────────────

    /// Run the pipeline unless it was already applied. Tools are only
    /// provisioned when at least one step has to run.
    pub async fn apply<F, Fut>(
        &self,
        profile: &InstallProfile,
        provision: F,
    ) -> InstallerResult<PipelineOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = InstallerResult<ToolConfig>>,
    {
        if self.is_already_applied(profile)? {
            info!("Processor outputs already present, skipping pipeline");
            self.set_state(PipelineState::Skipped);
            return Ok(PipelineOutcome::Skipped);
        }

        let tools = provision().await?;
        let steps = self.run(profile, &tools).await?;
        Ok(PipelineOutcome::Completed { steps })
    }

    /// Run every client-side step in declaration order. The first failure
    /// ends the run; later steps are never started.
    pub async fn run(&self, profile: &InstallProfile, tools: &ToolConfig) -> InstallerResult<usize> {
        let mut count = 0;
        for step in profile.steps_for(CLIENT_SIDE) {
            self.set_state(PipelineState::Running {
                step: step.name.clone(),
            });
            if let Err(e) = self.run_step(step, profile, tools).await {
                warn!("Processor {} failed: {}", step.name, e);
                self.set_state(PipelineState::Failed {
                    step: step.name.clone(),
                });
                return Err(e);
            }
            count += 1;
        }

        self.set_state(PipelineState::Completed);
        info!("Processor pipeline completed ({} steps)", count);
        Ok(count)
    }

    async fn run_step(
        &self,
        step: &ProcessorStep,
        profile: &InstallProfile,
        tools: &ToolConfig,
    ) -> InstallerResult<()> {
        let jar = self.library_path(&step.jar)?;
        if !jar.exists() {
            return Err(InstallerError::MissingProcessorJar(jar));
        }
        let main_class = self.main_class(&jar)?;

        let mut classpath = vec![path_string(&jar)];
        for entry in &step.classpath {
            classpath.push(path_string(&self.library_path(entry)?));
        }

        let mut argv = vec![
            "-classpath".to_string(),
            classpath.join(CLASSPATH_SEPARATOR),
            main_class.clone(),
        ];
        for arg in &step.args {
            argv.push(self.resolve_argument(arg, profile, tools)?);
        }

        info!(
            "Running processor {} ({}) with main class {}",
            step.name, step.jar, main_class
        );
        let output = self
            .runner
            .run(&tools.java, &argv, &self.layout.libraries, &self.events)
            .await?;

        if !output.success() {
            self.events.error(format!(
                "Processor {} exited with code {:?}",
                step.jar, output.exit_code
            ));
            return Err(InstallerError::ProcessorExecution {
                step: step.name.clone(),
                jar: step.jar.clone(),
                code: output.exit_code,
            });
        }
        Ok(())
    }
}

/// `{KEY}` → `KEY`.
fn data_key(arg: &str) -> Option<&str> {
    arg.strip_prefix('{')?.strip_suffix('}')
}

/// `[coordinate]` → `coordinate`.
fn bracketed(value: &str) -> Option<&str> {
    value.strip_prefix('[')?.strip_suffix(']')
}

/// `'literal'` → `literal`.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Manifest values may wrap onto continuation lines starting with a space.
fn parse_main_class(manifest: &str) -> Option<String> {
    let mut main_class: Option<String> = None;
    let mut current_key: Option<&str> = None;

    for line in manifest.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            current_key = Some(key.trim());
            if key.trim() == "Main-Class" {
                main_class = Some(value.trim().to_string());
            }
        }
    }

    main_class.filter(|c| !c.is_empty())
}
