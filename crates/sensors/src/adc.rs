//! ADS1115 16-bit ADC bank over I2C for soil moisture sensing.
//!
//! Reads single-ended channels at PGA ±4.096 V, 128 SPS, single-shot mode.
//! Up to four chips share the bus (ADDR pin strapped to 0x48..=0x4B), giving
//! sixteen probe channels. Channel `c` lives on chip `c / 4`, input `c % 4`.
//!
//! The register helpers are always compiled; the driver itself needs the
//! `adc` feature (rppal + Raspberry Pi hardware).

#[cfg(feature = "adc")]
use rppal::i2c::I2c;
#[cfg(feature = "adc")]
use std::{thread, time::Duration};

// ── ADS1115 register addresses ──────────────────────────────────────────────

/// Conversion result register (read-only, 16-bit signed).
#[cfg(feature = "adc")]
const REG_CONVERSION: u8 = 0x00;
/// Configuration register (read/write).
#[cfg(feature = "adc")]
const REG_CONFIG: u8 = 0x01;

// ── Config register bit fields ──────────────────────────────────────────────
//
// Layout (MSB first):
//   [15]    OS      : write 1 to start single-shot conversion
//   [14:12] MUX     : input multiplexer (channel selection)
//   [11:9]  PGA     : programmable gain amplifier
//   [8]     MODE    : 0 = continuous, 1 = single-shot
//   [7:5]   DR      : data rate
//   [4]     COMP_MODE
//   [3]     COMP_POL
//   [2]     COMP_LAT
//   [1:0]   COMP_QUE: 11 = disable comparator (default)

/// Bits common to all channel reads:
///   OS=1 (start), PGA=001 (±4.096 V), MODE=1 (single-shot),
///   DR=100 (128 SPS), COMP_QUE=11 (comparator off).
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;

/// MUX values for single-ended reads (AINx vs GND).
const MUX_SHIFT: u8 = 12;
const MUX_SINGLE_ENDED: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

/// Inputs per chip.
pub const INPUTS_PER_CHIP: u8 = 4;

/// Chips addressable on one bus (ADDR → GND, VDD, SDA, SCL).
pub const MAX_CHIPS: u8 = 4;

/// Lowest ADS1115 bus address (ADDR tied to GND).
pub const BASE_ADDRESS: u16 = 0x48;

/// Largest code a single-ended read can produce.
pub const ADS1115_MAX: u16 = 32767;

/// Conversion time at 128 SPS is ~7.8 ms.  We wait 9 ms for margin.
#[cfg(feature = "adc")]
const CONVERSION_WAIT: Duration = Duration::from_millis(9);

/// Bit 15 of the config register: conversion-ready flag when read.
#[cfg(feature = "adc")]
const OS_READY_BIT: u16 = 1 << 15;

/// Build the config register value for a single-ended read on `input`.
#[cfg_attr(not(feature = "adc"), allow(dead_code))]
fn config_for_input(input: u8) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[input as usize % 4] << MUX_SHIFT)
}

/// Split a bank-wide channel number into (bus address, chip input).
pub fn locate(base_addr: u16, channel: u8) -> anyhow::Result<(u16, u8)> {
    let chip = channel / INPUTS_PER_CHIP;
    anyhow::ensure!(
        chip < MAX_CHIPS,
        "ADS1115 channel {channel} out of range (0–{})",
        MAX_CHIPS * INPUTS_PER_CHIP - 1
    );
    Ok((base_addr + chip as u16, channel % INPUTS_PER_CHIP))
}

/// Parse an I2C address such as `"0x48"` or `"72"`.
pub fn parse_address(s: &str) -> anyhow::Result<u16> {
    let s = s.trim();
    let addr = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|_| anyhow::anyhow!("invalid I2C address: {s:?}"))?;
    anyhow::ensure!(
        (BASE_ADDRESS..BASE_ADDRESS + MAX_CHIPS as u16).contains(&addr),
        "I2C address {addr:#04x} is not an ADS1115 address (0x48–0x4b)"
    );
    Ok(addr)
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// ADS1115 bank driver backed by `rppal::i2c`.
#[cfg(feature = "adc")]
pub struct Ads1115Bank {
    i2c: I2c,
    base_addr: u16,
    selected: Option<u16>,
}

#[cfg(feature = "adc")]
impl Ads1115Bank {
    /// Open I2C bus 1; chips are expected at `base_addr` upward.
    pub fn new(base_addr: u16) -> anyhow::Result<Self> {
        let i2c = I2c::new()?;
        tracing::info!(
            addr = format_args!("0x{base_addr:02x}"),
            "ads1115 bank initialised"
        );
        Ok(Self {
            i2c,
            base_addr,
            selected: None,
        })
    }

    /// Perform a single-shot read on a bank-wide `channel`, returning the raw
    /// code (0–32767 for single-ended).
    pub fn read_channel(&mut self, channel: u8) -> anyhow::Result<u16> {
        let (addr, input) = locate(self.base_addr, channel)?;
        if self.selected != Some(addr) {
            self.i2c.set_slave_address(addr)?;
            self.selected = Some(addr);
        }

        let config_bytes = config_for_input(input).to_be_bytes();
        self.i2c.block_write(REG_CONFIG, &config_bytes)?;

        thread::sleep(CONVERSION_WAIT);

        for _ in 0..3 {
            let mut buf = [0u8; 2];
            self.i2c.block_read(REG_CONFIG, &mut buf)?;
            if u16::from_be_bytes(buf) & OS_READY_BIT != 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        // Single-ended reads are non-negative; clamp against bus corruption.
        let raw = i16::from_be_bytes(buf).max(0) as u16;
        Ok(raw.min(ADS1115_MAX))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
