//! Fixed hardware characteristics and timing budgets.

use std::time::Duration;

/// Reference clock feeding the PLL reconfiguration cores and the slow
/// peripheral fabric (I2C timing, pulser).
pub const REF_CLOCK_HZ: f64 = 50_000_000.0;

/// Sequencing clock runs at 16x the RF carrier.
pub const FSM_CLOCK_MULTIPLIER: f64 = 16.0;
/// ADC sampling clock runs at 4x the RF carrier.
pub const ADC_CLOCK_MULTIPLIER: f64 = 4.0;

/// I2C timing for ~100 kHz SCL off the 50 MHz reference.
pub const I2C_SCL_LOW_TICKS: u32 = 250;
pub const I2C_SCL_HIGH_TICKS: u32 = 250;
pub const I2C_SDA_HOLD_TICKS: u32 = 1;

/// Settle after each edge of a control-register pulse (FIFO reset,
/// pulser reset, phase-cycle flip).
pub const CTRL_PULSE_SETTLE: Duration = Duration::from_micros(10);

/// Settle between the run flag clearing and the first FIFO access. The
/// FIFO's first valid words are not guaranteed ready the instant the run
/// bit drops.
pub const FIFO_POST_RUN_SETTLE: Duration = Duration::from_micros(300);

/// Settle between DAC latch/clear line edges.
pub const DAC_LINE_SETTLE: Duration = Duration::from_micros(1);

/// Cadence of the status-register busy polls. The original code spun
/// without yielding; one microsecond keeps the latency while bounding the
/// bus traffic.
pub const POLL_CADENCE: Duration = Duration::from_micros(1);

/// Budget for a PLL to report lock after a reconfigure + reset.
pub const PLL_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Budget for the reconfiguration core's done handshake.
pub const PLL_RECONFIG_TIMEOUT: Duration = Duration::from_millis(100);

/// Budget for one SPI frame to the DAC (transfer-complete / receive-ready).
pub const SPI_TRANSFER_TIMEOUT: Duration = Duration::from_millis(50);

/// Budget for the I2C core to drain its command FIFO.
pub const I2C_TRANSFER_TIMEOUT: Duration = Duration::from_millis(50);

/// Fixed slack added on top of the computed sequence duration when waiting
/// for the run flag to clear.
pub const FSM_RUN_TIMEOUT_SLACK: Duration = Duration::from_millis(500);
