// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Hearth.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Visible status signal: steady on when nominal, rapid flashing when the
//! device needs help.

use hearth_runtime::clock::elapsed_ms;
use std::fmt;
use tracing::info;

/// Flash half-period
pub const FLASH_HALF_PERIOD_MS: u64 = 100;

/// On/off output, typically an LED
pub trait Indicator {
    fn set(&mut self, on: bool);
}

pub struct Signal {
    indicator: Box<dyn Indicator>,
    lit: Option<bool>,
    flashing: bool,
    last_toggle_ms: u64,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("lit", &self.lit)
            .field("flashing", &self.flashing)
            .finish_non_exhaustive()
    }
}

impl Signal {
    pub fn new(indicator: Box<dyn Indicator>) -> Self {
        Self {
            indicator,
            lit: None,
            flashing: false,
            last_toggle_ms: 0,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    pub fn update(&mut self, needs_help: bool, now: u64) {
        if needs_help != self.flashing {
            self.flashing = needs_help;
            info!(needs_help, "Status signal changed");
        }

        if !needs_help {
            if self.lit != Some(true) {
                self.drive(true, now);
            }
            return;
        }

        match self.lit {
            None => self.drive(true, now),
            Some(lit) if elapsed_ms(now, self.last_toggle_ms) >= FLASH_HALF_PERIOD_MS => {
                self.drive(!lit, now);
            }
            Some(_) => {}
        }
    }

    fn drive(&mut self, on: bool, now: u64) {
        self.indicator.set(on);
        self.lit = Some(on);
        self.last_toggle_ms = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<bool>>>);

    impl Indicator for Recorder {
        fn set(&mut self, on: bool) {
            self.0.borrow_mut().push(on);
        }
    }

    #[test]
    fn test_nominal_is_steady_on() {
        let recorder = Recorder::default();
        let mut signal = Signal::new(Box::new(recorder.clone()));
        signal.update(false, 0);
        signal.update(false, 500);
        signal.update(false, 1000);
        assert_eq!(*recorder.0.borrow(), vec![true]);
    }

    #[test]
    fn test_needs_help_flashes_at_half_period() {
        let recorder = Recorder::default();
        let mut signal = Signal::new(Box::new(recorder.clone()));
        signal.update(false, 0);
        signal.update(true, 100);
        signal.update(true, 150);
        signal.update(true, 200);
        signal.update(true, 300);
        assert_eq!(*recorder.0.borrow(), vec![true, false, true, false]);
        assert!(signal.is_flashing());

        signal.update(false, 310);
        assert_eq!(recorder.0.borrow().last(), Some(&true));
    }
}
