//! # Recording state notification hooks

use crate::error::{Error, Result};
use crate::recorder::RecordingState;
use log::*;
use std::path::PathBuf;
use std::process::Command;

/// Receives segment boundary notifications.
pub trait Notifier: Send {
    /// Called whenever a recording starts or stops.
    ///
    /// # Arguments
    ///
    /// * `state` - [`RecordingState::Recording`] on start, [`RecordingState::Waiting`] on stop.
    /// * `destination` - identifier of the segment's output.
    fn notify(&mut self, state: RecordingState, destination: &str) -> Result<()>;
}

/// Notifier that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _: RecordingState, _: &str) -> Result<()> {
        Ok(())
    }
}

/// Runs an external command as `<command> start|stop <destination>`.
///
/// The command runs in the background, its exit status is only logged.
pub struct CommandNotifier {
    command: PathBuf,
}

impl CommandNotifier {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn verb(state: RecordingState) -> &'static str {
        match state {
            RecordingState::Recording => "start",
            _ => "stop",
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&mut self, state: RecordingState, destination: &str) -> Result<()> {
        let verb = Self::verb(state);

        let mut child = Command::new(&self.command)
            .arg(verb)
            .arg(destination)
            .spawn()
            .map_err(|e| {
                Error::Notification(format!("unable to run {}: {e}", self.command.display()))
            })?;

        debug!("Spawned {} {verb} {destination}", self.command.display());

        let command = self.command.clone();

        // Reap the child so it does not linger as a zombie.
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                warn!("{} {verb} exited with {status}", command.display())
            }
            Err(e) => warn!("Failed to wait for {}: {e}", command.display()),
            _ => {}
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_is_notification_error() {
        let mut notifier = CommandNotifier::new("/nonexistent/definitely/not/here");
        assert!(matches!(
            notifier.notify(RecordingState::Recording, "x"),
            Err(Error::Notification(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn runs_command_with_arguments() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hook.sh");
        let out = dir.path().join("out.txt");

        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1 $2\" >> {}\n", out.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut notifier = CommandNotifier::new(&script);
        notifier
            .notify(RecordingState::Recording, "/tmp/seg.h264")
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(s) = std::fs::read_to_string(&out) {
                if s.ends_with('\n') {
                    assert_eq!(s, "start /tmp/seg.h264\n");
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        panic!("hook did not run");
    }
}
