//! Analog front end: the port-expander peripherals on the two I2C buses.
//!
//! The external bus carries the matching-network relay driver and the
//! receiver gain expander; the internal bus carries the power/signal-path
//! enable expander. The bit permutations in here are board-wiring
//! artifacts, not protocol: a future board spin swaps these helpers, never
//! the I2C logic.

use tca9555::{Bus, Tca9555};

use super::i2c::seven_bit_address;

/// Nominal 8-bit bus addresses from the board schematic. The I2C core
/// wants them with the direction bit dropped.
pub const RELAY_EXPANDER_ADDR: u8 = 0x40;
pub const GAIN_EXPANDER_ADDR: u8 = 0x42;
pub const ENABLE_EXPANDER_ADDR: u8 = 0x40;

/// Enable-line assignments on the internal expander.
pub const PSU_5V_ADC_EN: u16 = 1 << 0;
pub const PSU_5V_ANA_P_EN: u16 = 1 << 1;
pub const PSU_5V_ANA_N_EN: u16 = 1 << 2;
pub const PSU_5V_TX_N_EN: u16 = 1 << 3;
pub const PSU_15V_TX_P_EN: u16 = 1 << 4;
pub const PSU_15V_TX_N_EN: u16 = 1 << 5;
pub const AMP_HP_LT1210_EN: u16 = 1 << 6;
pub const PAMP_IN_SEL_RX: u16 = 1 << 7;
pub const RX_IN_SEL_1: u16 = 1 << 8;
pub const RX_IN_SEL_2: u16 = 1 << 9;

/// The relay banks are routed MSB-to-LSB swapped on the board.
pub fn relay_bit_order(byte: u8) -> u8 {
    byte.reverse_bits()
}

/// Receiver gain bits are active low; the upper nibble of the port is
/// unused and masked off.
pub fn rx_gain_word(code: u8) -> u8 {
    !code & 0x0f
}

/// Fold an enable/disable request into the persisted line image.
pub fn fold_enable_mask(shadow: u16, enable: bool, mask: u16) -> u16 {
    if enable {
        shadow | mask
    } else {
        shadow & !mask
    }
}

/// Matching-network capacitor banks: one expander port per bank.
pub struct MatchingNetwork {
    expander: Tca9555,
}

impl Default for MatchingNetwork {
    fn default() -> Self {
        Self {
            expander: Tca9555::new(seven_bit_address(RELAY_EXPANDER_ADDR)),
        }
    }
}

impl MatchingNetwork {
    /// Close the requested shunt/series relay combinations.
    pub fn set_capacitors<B>(
        &self,
        bus: &mut B,
        shunt: u8,
        series: u8,
    ) -> Result<(), B::Error>
    where
        B: Bus,
    {
        log::debug!("matching network: shunt {shunt:#04x}, series {series:#04x}");
        self.expander.write_pair(
            bus,
            relay_bit_order(shunt),
            relay_bit_order(series),
        )
    }
}

/// Last-stage receiver amplifier gain.
pub struct RxGain {
    expander: Tca9555,
}

impl Default for RxGain {
    fn default() -> Self {
        Self {
            expander: Tca9555::new(seven_bit_address(GAIN_EXPANDER_ADDR)),
        }
    }
}

impl RxGain {
    /// Program the 4-bit gain code.
    pub fn set<B: Bus>(&self, bus: &mut B, code: u8) -> Result<(), B::Error> {
        self.expander.write_pair(bus, rx_gain_word(code), 0x00)
    }
}

/// Power-rail and signal-path enables on the internal expander.
///
/// The expander has no reliable readback path once outputs are driven, so
/// the line image persists here and the full 16 bits are rewritten on every
/// call. The image is owned by this driver instance — callers hand in
/// deltas, never absolute words.
pub struct EnableLines {
    expander: Tca9555,
    shadow: u16,
}

impl Default for EnableLines {
    fn default() -> Self {
        Self {
            expander: Tca9555::new(seven_bit_address(ENABLE_EXPANDER_ADDR)),
            shadow: 0,
        }
    }
}

impl EnableLines {
    pub fn shadow(&self) -> u16 {
        self.shadow
    }

    /// Enable or disable the lines in `mask`, leaving the rest untouched.
    pub fn set<B: Bus>(
        &mut self,
        bus: &mut B,
        enable: bool,
        mask: u16,
    ) -> Result<(), B::Error> {
        self.shadow = fold_enable_mask(self.shadow, enable, mask);
        log::debug!("enable lines: image now {:#06x}", self.shadow);
        self.expander.write_pair(
            bus,
            (self.shadow & 0xff) as u8,
            (self.shadow >> 8) as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_order_flips_lsb_to_msb() {
        assert_eq!(relay_bit_order(0b0000_0001), 0b1000_0000);
        assert_eq!(relay_bit_order(0b0001_0110), 0b0110_1000);
    }

    #[test]
    fn relay_order_is_an_involution() {
        for byte in 0..=u8::MAX {
            assert_eq!(relay_bit_order(relay_bit_order(byte)), byte);
        }
    }

    #[test]
    fn gain_is_active_low_nibble() {
        assert_eq!(rx_gain_word(0x00), 0x0f);
        assert_eq!(rx_gain_word(0x0f), 0x00);
        assert_eq!(rx_gain_word(0xf5), 0x0a);
    }

    #[test]
    fn enable_mask_folding() {
        let mut image = 0u16;
        image = fold_enable_mask(image, true, PSU_5V_ADC_EN | PSU_15V_TX_P_EN);
        assert_eq!(image, 0b1_0001);
        image = fold_enable_mask(image, true, RX_IN_SEL_1);
        image = fold_enable_mask(image, false, PSU_5V_ADC_EN);
        assert_eq!(image, PSU_15V_TX_P_EN | RX_IN_SEL_1);
    }
}
