//! The session endpoint hosted inside the target process
//!
//! Lifecycle of one session:
//!
//! 1. `bind` publishes a fresh session handle and starts waiting
//! 2. `wait` returns once a console has assigned its devices
//! 3. `run` takes over the process-wide settings, runs the REPL engine
//!    through the console's devices, then tears everything down
//!
//! Teardown happens however the engine ends: normally, with an error, or by
//! panicking (the panic is resumed once teardown is complete). A caller that
//! drops the `run` future instead follows up with `abort`.

use std::sync::Arc;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use rr_core::config::EndpointConfig;
use rr_core::{OutputSink, ReplSettings, RpcServer, RrError, ServiceGuard, SessionError};
use rr_protocol::Address;

use crate::context::{Redirect, SessionContext};
use crate::handle::SessionHandle;
use crate::repl::{Repl, ReplIo, ReplOptions};
use crate::service::HandleService;
use crate::shell::ShellRedirector;

/// Where an endpoint is in its single session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Handle published, no console yet
    Waiting,
    /// Console assigned input, output and thread
    Attached,
    /// REPL engine running
    Running,
    /// Settings restored, console resumed, service stopped
    TornDown,
}

/// How an endpoint binds and what it does to the host process
#[derive(Clone)]
pub struct EndpointOptions {
    pub address: Address,
    /// Redirect process output to the console's streams when offered
    pub capture: bool,
    /// Shell used by the redirected system hook
    pub shell: Option<String>,
    pub settings: Arc<ReplSettings>,
    pub repl: ReplOptions,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self::from_config(&EndpointConfig::default())
    }
}

impl EndpointOptions {
    /// Options from a config file, using the process-wide settings
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self {
            address: config.address(),
            capture: config.capture,
            shell: config.shell.clone(),
            settings: ReplSettings::global(),
            repl: ReplOptions::default(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Use `settings` instead of the process-wide instance
    pub fn with_settings(mut self, settings: Arc<ReplSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_repl_options(mut self, repl: ReplOptions) -> Self {
        self.repl = repl;
        self
    }
}

impl std::fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("address", &self.address)
            .field("capture", &self.capture)
            .field("shell", &self.shell)
            .field("repl", &self.repl)
            .finish_non_exhaustive()
    }
}

/// One remote session against `target`
pub struct Endpoint<T> {
    target: T,
    options: EndpointOptions,
    handle: Arc<SessionHandle>,
    service: Option<ServiceGuard>,
    local_address: Address,
    state: EndpointState,
}

impl<T: Send + Sync + 'static> Endpoint<T> {
    /// Bind the service address and publish a fresh session handle
    pub async fn bind(target: T, options: EndpointOptions) -> Result<Self, RrError> {
        let handle = Arc::new(SessionHandle::new());
        let server = RpcServer::bind(&options.address).await?;
        let local_address = server.address().clone();

        tracing::info!("Waiting for console on {}", local_address);
        let service = server.spawn(Arc::new(HandleService::new(Arc::clone(&handle))));

        Ok(Self {
            target,
            options,
            handle,
            service: Some(service),
            local_address,
            state: EndpointState::Waiting,
        })
    }

    /// Address consoles connect to; carries the real port when bound to 0
    pub fn local_address(&self) -> &Address {
        &self.local_address
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Block until a console has attached
    pub async fn wait(&mut self) {
        if self.state != EndpointState::Waiting {
            return;
        }
        self.handle.wait().await;
        self.state = EndpointState::Attached;
        tracing::info!("Console attached, starting remote session");
    }

    /// Run the session to completion, waiting for a console first if needed
    pub async fn run<R: Repl<T>>(&mut self, repl: &mut R) -> anyhow::Result<()> {
        if self.state == EndpointState::TornDown {
            anyhow::bail!("session on {} has already ended", self.local_address);
        }
        self.wait().await;

        let outcome = match self.setup() {
            Ok((context, io)) => {
                self.state = EndpointState::Running;
                let settings = Arc::clone(context.settings());
                let result = AssertUnwindSafe(repl.start(
                    &self.target,
                    io,
                    settings,
                    &self.options.repl,
                ))
                .catch_unwind()
                .await;
                context.release();
                result
            }
            Err(e) => Ok(Err(e.into())),
        };

        self.teardown().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Take over the process settings and build the engine's devices
    fn setup(&self) -> Result<(SessionContext, ReplIo), SessionError> {
        let input = self.handle.input_proxy()?;
        let output: Arc<dyn OutputSink> =
            Arc::new(self.handle.output().ok_or(SessionError::NotAttached)?);

        let redirect = if self.options.capture {
            Redirect {
                stdout: self
                    .handle
                    .stdout()
                    .map(|sink| Arc::new(sink) as Arc<dyn OutputSink>),
                stderr: self
                    .handle
                    .stderr()
                    .map(|sink| Arc::new(sink) as Arc<dyn OutputSink>),
            }
        } else {
            tracing::debug!("Output capture disabled, leaving process streams alone");
            Redirect::none()
        };

        let system = Arc::new(ShellRedirector::new(self.options.shell.clone()));
        let context = SessionContext::acquire(Arc::clone(&self.options.settings), redirect, system)?;

        Ok((context, ReplIo { input, output }))
    }

    /// Tear down a session whose `run` future was dropped before finishing.
    ///
    /// Dropping `run` restores the settings but cannot reach the console, so
    /// callers that cancel it (on Ctrl-C, say) finish the job here. Does
    /// nothing once torn down.
    pub async fn abort(&mut self) {
        match self.state {
            EndpointState::TornDown => {}
            EndpointState::Waiting if !self.handle.is_populated() => {
                tracing::info!("No console attached, stopping service on {}", self.local_address);
                if let Some(service) = self.service.take() {
                    service.shutdown().await;
                }
                self.state = EndpointState::TornDown;
            }
            _ => self.teardown().await,
        }
    }

    async fn teardown(&mut self) {
        tracing::info!("Remote session terminated");

        // A console woken below may come straight back; it must not find
        // this handle again
        if let Some(service) = self.service.as_mut() {
            service.stop_accepting().await;
        }

        if let Err(e) = self.handle.kill().await {
            tracing::warn!("Could not resume console ({}). Continuing to stop service", e);
        }
        self.handle.disconnect();

        if let Some(service) = self.service.take() {
            service.shutdown().await;
        }
        self.state = EndpointState::TornDown;
    }
}

impl<T> std::fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.local_address)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Bind, wait for a console and run one session against `target`
pub async fn serve<T, R>(target: T, options: EndpointOptions, repl: &mut R) -> anyhow::Result<()>
where
    T: Send + Sync + 'static,
    R: Repl<T>,
{
    let mut endpoint = Endpoint::bind(target, options).await?;
    endpoint.run(repl).await
}
