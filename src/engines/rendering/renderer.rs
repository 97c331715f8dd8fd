use crate::config::RenderConfig;
use crate::engines::rendering::cancel::CancelToken;
use crate::error::{AestheticError, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Everything a renderer needs to produce one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub identity: String,
    /// Output path without extension
    pub stem: PathBuf,
    /// File the renderer is expected to leave behind
    pub output: PathBuf,
    /// One infix argument per axis: x y z r g b
    pub arguments: Vec<String>,
}

/// Turns a render request into an image file at `request.output`.
///
/// Implementations block until the artifact is written, and return
/// `Err(Cancelled)` promptly once the token is raised.
pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<()>;
}

/// Runs the external native renderer as a child process
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    program: PathBuf,
    width: u32,
    height: u32,
    points: u64,
    timeout: Duration,
    poll_interval: Duration,
}

impl ProcessRenderer {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            program: config.renderer_path.clone(),
            width: config.width,
            height: config.height,
            points: config.points,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// `<renderer> -save -p <points> -s <w> <h> <stem> x y z r g b`
    pub fn save_command(&self, request: &RenderRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-save")
            .arg("-p")
            .arg(self.points.to_string())
            .arg("-s")
            .arg(self.width.to_string())
            .arg(self.height.to_string())
            .arg(&request.stem)
            .args(&request.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Opens the renderer's own interactive window and returns immediately
    /// with its pid. The window process is reaped on a background thread.
    pub fn spawn_interactive(&self, arguments: &[String]) -> Result<u32> {
        let mut child = Command::new(&self.program)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AestheticError::RendererIo(format!(
                    "Failed to launch {}: {}",
                    self.program.display(),
                    e
                ))
            })?;
        let pid = child.id();
        log::info!("Interactive renderer started (pid {})", pid);

        let reaper = std::thread::Builder::new()
            .name(format!("viewer-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => log::debug!("Interactive renderer {} exited with {}", pid, status),
                Err(e) => log::warn!("Failed to wait for interactive renderer {}: {}", pid, e),
            });
        if let Err(e) = reaper {
            log::warn!("Interactive renderer {} will not be reaped: {}", pid, e);
        }
        Ok(pid)
    }

    fn wait(&self, child: &mut Child, identity: &str, cancel: &CancelToken) -> Result<()> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(AestheticError::RendererIo(format!(
                    "Renderer exited with {} for {}",
                    status, identity
                )));
            }

            if cancel.is_cancelled() {
                kill(child, identity);
                return Err(AestheticError::Cancelled);
            }

            if started.elapsed() >= self.timeout {
                kill(child, identity);
                return Err(AestheticError::RenderTimeout(self.timeout.as_secs()));
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}

impl Renderer for ProcessRenderer {
    fn render(&self, request: &RenderRequest, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let mut child = self.save_command(request).spawn().map_err(|e| {
            AestheticError::RendererIo(format!(
                "Failed to launch {}: {}",
                self.program.display(),
                e
            ))
        })?;
        log::debug!("Renderer pid {} started for {}", child.id(), request.identity);
        self.wait(&mut child, &request.identity, cancel)
    }
}

fn kill(child: &mut Child, identity: &str) {
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill renderer for {}: {}", identity, e);
    }
    // Reap so the child does not linger as a zombie
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        RenderRequest {
            identity: "fractal_0011223344556677".to_string(),
            stem: PathBuf::from("images/fractal_0011223344556677"),
            output: PathBuf::from("images/fractal_0011223344556677.png"),
            arguments: ["x", "y", "0", "1", "1", "1"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_save_command_layout() {
        let renderer = ProcessRenderer::from_config(&RenderConfig::default());
        let cmd = renderer.save_command(&request());
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-save",
                "-p",
                "100000",
                "-s",
                "400",
                "300",
                "images/fractal_0011223344556677",
                "x",
                "y",
                "0",
                "1",
                "1",
                "1"
            ]
        );
        assert_eq!(cmd.get_program(), "C-Genetics/aesthetics");
    }

    #[test]
    fn test_missing_program_is_renderer_error() {
        let config = RenderConfig {
            renderer_path: PathBuf::from("/nonexistent/aesthetics-renderer"),
            ..RenderConfig::default()
        };
        let renderer = ProcessRenderer::from_config(&config);
        let result = renderer.render(&request(), &CancelToken::new());
        assert!(matches!(result, Err(AestheticError::RendererIo(_))));
    }

    #[test]
    fn test_cancelled_before_spawn() {
        let renderer = ProcessRenderer::from_config(&RenderConfig::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            renderer.render(&request(), &cancel),
            Err(AestheticError::Cancelled)
        ));
    }

    #[cfg(target_os = "linux")]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use std::thread;

        /// A renderer that records its pid next to itself and never finishes
        fn sleeping_renderer(dir: &Path, timeout_secs: u64) -> ProcessRenderer {
            let script = dir.join("renderer.sh");
            std::fs::write(&script, "#!/bin/sh\necho $$ > \"$(dirname \"$0\")/pid\"\nexec sleep 30\n").unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            ProcessRenderer::from_config(&RenderConfig {
                renderer_path: script,
                timeout_secs,
                ..RenderConfig::default()
            })
        }

        /// Parallel tests forking while the script is still open can make exec fail with ETXTBSY
        fn render_script(renderer: &ProcessRenderer, cancel: &CancelToken) -> Result<()> {
            for _ in 0..20 {
                match renderer.render(&request(), cancel) {
                    Err(AestheticError::RendererIo(msg)) if msg.contains("busy") => {
                        thread::sleep(Duration::from_millis(50));
                    }
                    other => return other,
                }
            }
            renderer.render(&request(), cancel)
        }

        fn wait_for_pid(dir: &Path) -> u32 {
            let path = dir.join("pid");
            let deadline = Instant::now() + Duration::from_secs(10);
            loop {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    if let Ok(pid) = text.trim().parse() {
                        return pid;
                    }
                }
                assert!(Instant::now() < deadline, "renderer never wrote its pid");
                thread::sleep(Duration::from_millis(10));
            }
        }

        fn is_running(pid: u32) -> bool {
            Path::new(&format!("/proc/{}", pid)).exists()
        }

        #[test]
        fn test_hung_renderer_times_out_and_is_killed() {
            let dir = tempfile::tempdir().unwrap();
            let renderer = sleeping_renderer(dir.path(), 1);

            let started = Instant::now();
            let result = render_script(&renderer, &CancelToken::new());
            assert!(matches!(result, Err(AestheticError::RenderTimeout(1))), "{:?}", result);
            assert!(started.elapsed() < Duration::from_secs(10));

            let pid = wait_for_pid(dir.path());
            assert!(!is_running(pid), "renderer {} still running after timeout", pid);
        }

        #[test]
        fn test_cancel_kills_running_renderer() {
            let dir = tempfile::tempdir().unwrap();
            let renderer = sleeping_renderer(dir.path(), 60);
            let cancel = CancelToken::new();

            let started = Instant::now();
            let result = thread::scope(|scope| {
                let canceller = cancel.clone();
                let pid_dir = dir.path().to_path_buf();
                scope.spawn(move || {
                    wait_for_pid(&pid_dir);
                    canceller.cancel();
                });
                render_script(&renderer, &cancel)
            });
            assert!(matches!(result, Err(AestheticError::Cancelled)), "{:?}", result);
            assert!(started.elapsed() < Duration::from_secs(10));

            let pid = wait_for_pid(dir.path());
            assert!(!is_running(pid), "renderer {} still running after cancel", pid);
        }

        #[test]
        fn test_interactive_renderer_is_reaped() {
            let renderer = ProcessRenderer::from_config(&RenderConfig {
                renderer_path: PathBuf::from("true"),
                ..RenderConfig::default()
            });
            let pid = renderer.spawn_interactive(&[]).unwrap();

            let deadline = Instant::now() + Duration::from_secs(10);
            while is_running(pid) {
                assert!(Instant::now() < deadline, "interactive renderer {} left as a zombie", pid);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
