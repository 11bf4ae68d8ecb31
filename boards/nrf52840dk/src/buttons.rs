// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! The four DK buttons, standing in for BACK, UP, CENTER and DOWN.

use pblboot_common::hil;

use crate::gpio::Port;

const BUTTON_BACK: usize = 11; // P0.11, button 1
const BUTTON_UP: usize = 12; // P0.12, button 2
const BUTTON_CENTER: usize = 24; // P0.24, button 3
const BUTTON_DOWN: usize = 25; // P0.25, button 4

const BUTTONS: [usize; 4] = [BUTTON_BACK, BUTTON_UP, BUTTON_CENTER, BUTTON_DOWN];

pub struct Buttons {
    port: Port,
}

impl Buttons {
    pub fn new() -> Self {
        Self { port: Port::new() }
    }

    pub fn init(&self) {
        for pin in BUTTONS {
            self.port.make_input_pullup(pin);
        }
    }

    /// Buttons are active low.
    fn pressed(&self, pin: usize) -> bool {
        !self.port.read(pin)
    }
}

impl hil::Device for Buttons {
    fn name(&self) -> &'static str {
        "buttons"
    }

    fn is_ready(&self) -> bool {
        BUTTONS.iter().all(|&pin| self.port.is_input_pullup(pin))
    }
}

impl hil::Buttons for Buttons {
    fn any_pressed(&self) -> bool {
        BUTTONS.iter().any(|&pin| self.pressed(pin))
    }

    fn prf_combo_pressed(&self) -> bool {
        self.pressed(BUTTON_BACK)
            && self.pressed(BUTTON_UP)
            && self.pressed(BUTTON_CENTER)
            && !self.pressed(BUTTON_DOWN)
    }
}
