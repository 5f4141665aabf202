//! Phase-end notification collaborator.
//!
//! Notifications are best effort. The controller calls [`PhaseNotifier`]
//! before every phase change and ignores whatever it returns, so an
//! implementation may fail freely when the output device is missing.
//!
//! Whether audio output has been "unlocked" (some platforms refuse sound
//! until a user gesture) is state of the notifier instance, established by
//! [`PhaseNotifier::unlock`] when a session starts.

use std::io::Write;

use tracing::debug;

use crate::error::NotifyError;
use crate::timer::Phase;

pub trait PhaseNotifier: Send {
    /// Prepare output on the first user interaction. Default no-op.
    fn unlock(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    /// A phase just ran out.
    fn notify_phase_end(&mut self, phase: Phase) -> Result<(), NotifyError>;
}

/// Does nothing. Used when sound and vibration are both off.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl PhaseNotifier for SilentNotifier {
    fn notify_phase_end(&mut self, _phase: Phase) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Rings the terminal bell on phase end.
///
/// A terminal bell has no loudness, so volume only mutes it at 0. Vibration
/// has no terminal equivalent and is only traced.
#[derive(Debug)]
pub struct BellNotifier<W: Write + Send> {
    out: W,
    sound: bool,
    vibrate: bool,
    volume: u32,
    unlocked: bool,
}

impl<W: Write + Send> BellNotifier<W> {
    pub fn new(out: W, sound: bool, vibrate: bool) -> Self {
        Self {
            out,
            sound,
            vibrate,
            volume: 100,
            unlocked: false,
        }
    }

    /// Volume in percent, 0 to 100.
    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = volume.min(100);
        self
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    fn audible(&self) -> bool {
        self.sound && self.volume > 0
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> PhaseNotifier for BellNotifier<W> {
    fn unlock(&mut self) -> Result<(), NotifyError> {
        if self.unlocked {
            return Ok(());
        }
        // Marked unlocked even on failure so the attempt is not repeated
        // before every phase.
        self.unlocked = true;
        self.out.flush()?;
        Ok(())
    }

    fn notify_phase_end(&mut self, phase: Phase) -> Result<(), NotifyError> {
        if !self.unlocked {
            self.unlock()?;
        }
        if self.vibrate {
            debug!(?phase, "vibration requested, not supported on a terminal");
        }
        if self.audible() {
            self.out.write_all(b"\x07")?;
            self.out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_rings_when_sound_enabled() {
        let mut n = BellNotifier::new(Vec::new(), true, false);
        n.notify_phase_end(Phase::Practice).unwrap();
        n.notify_phase_end(Phase::Rest).unwrap();
        assert!(n.is_unlocked());
        assert_eq!(n.into_inner(), b"\x07\x07".to_vec());
    }

    #[test]
    fn bell_stays_quiet_when_sound_disabled() {
        let mut n = BellNotifier::new(Vec::new(), false, true);
        n.notify_phase_end(Phase::Practice).unwrap();
        assert!(n.into_inner().is_empty());
    }

    #[test]
    fn zero_volume_mutes_the_bell() {
        let mut n = BellNotifier::new(Vec::new(), true, false).with_volume(0);
        n.notify_phase_end(Phase::Rest).unwrap();
        assert!(n.into_inner().is_empty());

        let n = BellNotifier::new(Vec::new(), true, false).with_volume(250);
        assert_eq!(n.volume(), 100);
    }

    #[test]
    fn unlock_is_remembered() {
        let mut n = BellNotifier::new(Vec::new(), true, true);
        assert!(!n.is_unlocked());
        n.unlock().unwrap();
        n.unlock().unwrap();
        assert!(n.is_unlocked());
    }
}
