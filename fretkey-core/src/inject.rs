//! Key injection boundary. The core only decides *what* to type; backends
//! implementing `KeyInjector` decide how it reaches the user.

use std::io::Write;

use crate::error::InjectError;
use crate::mapping::KeyAction;

/// Produces the side effect for a key action.
pub trait KeyInjector {
    fn inject(&mut self, action: KeyAction) -> Result<(), InjectError>;
}

/// Types key actions as text into a writer (stdout in the CLI).
#[derive(Debug)]
pub struct ConsoleInjector<W: Write> {
    out: W,
}

impl<W: Write> ConsoleInjector<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> KeyInjector for ConsoleInjector<W> {
    fn inject(&mut self, action: KeyAction) -> Result<(), InjectError> {
        match action {
            // Erase the previous character on a terminal.
            KeyAction::Backspace => self.out.write_all(b"\x08 \x08")?,
            other => self.out.write_all(other.as_text().as_bytes())?,
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Logs actions without producing any output.
#[derive(Debug, Default)]
pub struct DryRunInjector {
    pub injected: Vec<KeyAction>,
}

impl KeyInjector for DryRunInjector {
    fn inject(&mut self, action: KeyAction) -> Result<(), InjectError> {
        log::info!("[dry-run] would type {}", action);
        self.injected.push(action);
        Ok(())
    }
}

/// Injects `action`, logging failures instead of propagating them.
///
/// Returns whether the injection succeeded.
pub fn inject_or_log(injector: &mut dyn KeyInjector, action: KeyAction) -> bool {
    match injector.inject(action) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Key injection failed for {}: {}", action, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingInjector;

    impl KeyInjector for FailingInjector {
        fn inject(&mut self, _action: KeyAction) -> Result<(), InjectError> {
            Err(InjectError::Unavailable("no display".to_string()))
        }
    }

    #[test]
    fn console_injector_writes_text() {
        let mut injector = ConsoleInjector::new(Vec::new());
        injector.inject(KeyAction::Char('a')).unwrap();
        injector.inject(KeyAction::Space).unwrap();
        injector.inject(KeyAction::Enter).unwrap();
        injector.inject(KeyAction::Backspace).unwrap();
        assert_eq!(injector.into_inner(), b"a \n\x08 \x08".to_vec());
    }

    #[test]
    fn failures_are_not_fatal() {
        let mut failing = FailingInjector;
        assert!(!inject_or_log(&mut failing, KeyAction::Enter));

        let mut dry = DryRunInjector::default();
        assert!(inject_or_log(&mut dry, KeyAction::Char('x')));
        assert_eq!(dry.injected, vec![KeyAction::Char('x')]);
    }
}
