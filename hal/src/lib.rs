//! STM32G0 flash programming driver.
//!
//! Erase and program operations for the internal flash, the OTP area and the
//! option bytes of the STM32G0 series, as run by a debug probe host inside a
//! flash algorithm image.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod macros;

pub mod algo;
pub mod device;
pub mod flash;
pub mod geometry;
pub mod info;
pub mod option;
pub mod regs;
pub mod watchdog;

#[cfg(any(test, feature = "sim"))]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;

pub use cortex_m;
