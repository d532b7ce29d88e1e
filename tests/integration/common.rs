//! Shared fixtures for the integration suite.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tplbuild::context::ExtensionContext;
use tplbuild::{Capabilities, Extension, ExtensionSet, Header, TplInfo};

/// Initialize test logging once; controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ordered log of hook invocations, shared across extensions.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// A configurable extension that records every hook invocation.
#[derive(Clone)]
pub struct ProbeExtension {
    pub tag: String,
    pub self_name: Option<String>,
    pub caps: Capabilities,
    pub recorder: Recorder,
    /// Field written into the header during `on_build_header`.
    pub header_field: Option<(String, String)>,
    /// Field read back from the header during `on_build` and recorded.
    pub read_field: Option<String>,
    /// Sleep at the start of `on_build_header`, to widen race windows.
    pub delay: Option<Duration>,
    /// Hook that fails on invocation.
    pub fail_hook: Option<&'static str>,
}

impl ProbeExtension {
    pub fn new(tag: &str, caps: Capabilities, recorder: &Recorder) -> Self {
        Self {
            tag: tag.to_string(),
            self_name: None,
            caps,
            recorder: recorder.clone(),
            header_field: None,
            read_field: None,
            delay: None,
            fail_hook: None,
        }
    }

    pub fn with_self_name(mut self, name: &str) -> Self {
        self.self_name = Some(name.to_string());
        self
    }

    pub fn with_header_field(mut self, key: &str, value: &str) -> Self {
        self.header_field = Some((key.to_string(), value.to_string()));
        self
    }

    pub fn with_read_field(mut self, key: &str) -> Self {
        self.read_field = Some(key.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_in(mut self, hook: &'static str) -> Self {
        self.fail_hook = Some(hook);
        self
    }

    fn record(&self, hook: &str) {
        self.recorder.push(format!("{}.{hook}", self.tag));
    }

    fn maybe_fail(&self, hook: &'static str) -> anyhow::Result<()> {
        if self.fail_hook == Some(hook) {
            anyhow::bail!("{hook} failed by request");
        }
        Ok(())
    }
}

#[async_trait]
impl Extension for ProbeExtension {
    fn name(&self) -> Option<&str> {
        self.self_name.as_deref()
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn on_create(&self, _ctx: &ExtensionContext) -> anyhow::Result<()> {
        self.maybe_fail("on_create")?;
        self.record("on_create");
        Ok(())
    }

    async fn on_tpl_changed(
        &self,
        _ctx: &ExtensionContext,
        _tpl_info: &TplInfo,
    ) -> anyhow::Result<()> {
        self.maybe_fail("on_tpl_changed")?;
        self.record("on_tpl_changed");
        Ok(())
    }

    async fn on_build_header(
        &self,
        _ctx: &ExtensionContext,
        header: &mut Header,
    ) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.maybe_fail("on_build_header")?;
        self.record("on_build_header");
        if let Some((key, value)) = &self.header_field {
            header.set(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn on_build(&self, _ctx: &ExtensionContext, header: &Header) -> anyhow::Result<()> {
        self.maybe_fail("on_build")?;
        match &self.read_field {
            Some(key) => self.recorder.push(format!(
                "{}.on_build {key}={}",
                self.tag,
                header.get_str(key).unwrap_or("<none>")
            )),
            None => self.record("on_build"),
        }
        Ok(())
    }

    async fn on_clean(&self, _ctx: &ExtensionContext) -> anyhow::Result<()> {
        self.maybe_fail("on_clean")?;
        self.record("on_clean");
        Ok(())
    }
}

/// Build an extension set holding one factory per probe, keyed by tag.
pub fn set_of(probes: impl IntoIterator<Item = ProbeExtension>) -> ExtensionSet {
    let mut set = ExtensionSet::new();
    for probe in probes {
        let tag = probe.tag.clone();
        set.register(tag, move || Arc::new(probe.clone()));
    }
    set
}

/// Capabilities covering the full build cycle (everything but clean).
pub fn cycle_caps() -> Capabilities {
    Capabilities {
        on_create: true,
        on_tpl_changed: true,
        on_build_header: true,
        on_build: true,
        on_clean: false,
    }
}

/// Write a config file into a fresh temp dir; keep the dir alive.
pub fn config_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("tpl.json");
    std::fs::write(&path, contents).expect("write tpl.json");
    (dir, path)
}
