//! Flash geometry
//!
//! Page numbering of the G0 line:
//!
//! | Device                    | `DUAL_BANK` | Range                       | Bank | Pages    |
//! |---------------------------|-------------|-----------------------------|------|----------|
//! | single bank               | -           | `0x0800_0000..0x0802_0000`  | 0    | 0..64    |
//! | 256k dual bank            | 1           | `0x0800_0000..0x0802_0000`  | 0    | 0..64    |
//! |                           |             | `0x0802_0000..0x0804_0000`  | 1    | 0..64    |
//! | 256k dual bank            | 0           | `0x0800_0000..0x0804_0000`  | 0    | 0..128   |
//! | 512k dual bank            | either      | `0x0800_0000..0x0804_0000`  | 0    | 0..128   |
//! |                           |             | `0x0804_0000..0x0808_0000`  | 1    | 0..128   |
//!
//! 512k devices always use two bank numbers, even when configured as a single
//! bank.

use crate::{
    info,
    regs::{Reg, RegisterFile, optr},
};

/// Size of the 512 KiB parts that always address two banks.
const SIZE_512K: u32 = 0x8_0000;

/// 2k page.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Page {
    bank: Bank,
    idx: u16,
}

impl Page {
    /// Page size in bytes.
    pub const SIZE: u32 = 2048;

    const SHIFT: u32 = 11;

    /// Bank the page belongs to.
    pub const fn bank(&self) -> Bank {
        self.bank
    }

    /// Page index, relative to the bank when dual-bank addressing is in use.
    pub const fn to_index(&self) -> u16 {
        self.idx
    }
}

/// Flash bank.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Bank {
    /// Bank 1, `BKER = 0`.
    Bank1 = 0,
    /// Bank 2, `BKER = 1`.
    Bank2 = 1,
}

impl Bank {
    /// Bank number as used by `BKER`.
    pub const fn to_index(self) -> u32 {
        self as u32
    }
}

/// Flash type, derived from the device ID.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashType {
    /// Single bank flash, not configurable.
    SingleBank,
    /// Dual bank flash, configurable as single bank with `DUAL_BANK`.
    DualBank,
}

impl FlashType {
    /// Flash type of a raw device ID.
    ///
    /// Unknown IDs are assumed to be configurable dual bank devices.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::{geometry::FlashType, info::DeviceId};
    ///
    /// assert_eq!(FlashType::from_device_id(Ok(DeviceId::G03x)), FlashType::SingleBank);
    /// assert_eq!(FlashType::from_device_id(Ok(DeviceId::G0Bx)), FlashType::DualBank);
    /// assert_eq!(FlashType::from_device_id(Err(0x123)), FlashType::DualBank);
    /// ```
    pub const fn from_device_id(id: Result<info::DeviceId, u16>) -> Self {
        match id {
            Ok(id) if id.is_single_bank() => FlashType::SingleBank,
            _ => FlashType::DualBank,
        }
    }
}

/// Bank mode, from the `DUAL_BANK` option bit.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BankMode {
    /// Configured as single bank (`DUAL_BANK = 0`).
    Single,
    /// Configured as dual bank (`DUAL_BANK = 1`).
    Dual,
}

impl BankMode {
    /// Bank mode from a raw `OPTR` value.
    pub const fn from_optr(optr: u32) -> Self {
        if optr & optr::DUAL_BANK != 0 {
            BankMode::Dual
        } else {
            BankMode::Single
        }
    }
}

/// Main flash geometry.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    base: u32,
    size: u32,
    bank_size: u32,
    flash_type: FlashType,
    bank_mode: BankMode,
}

impl Geometry {
    /// Create a geometry from known values.
    ///
    /// The bank size is always half of `size`, `size` must be a power of two.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::geometry::{BankMode, FlashType, Geometry};
    ///
    /// let geo = Geometry::new(0x0800_0000, 0x1_0000, FlashType::SingleBank, BankMode::Single);
    /// assert_eq!(geo.bank_size(), 0x8000);
    /// assert_eq!(geo.bank_count(), 1);
    /// ```
    pub const fn new(base: u32, size: u32, flash_type: FlashType, bank_mode: BankMode) -> Self {
        Self {
            base,
            size,
            bank_size: size >> 1,
            flash_type,
            bank_mode,
        }
    }

    /// Read the geometry of the running device.
    ///
    /// `base` is the device start address given by the host.
    pub fn probe<R: RegisterFile>(regs: &mut R, base: u32) -> Self {
        let size: u32 = info::flash_size(regs);
        let flash_type: FlashType = FlashType::from_device_id(info::device_id(regs));
        let bank_mode: BankMode = BankMode::from_optr(regs.read(Reg::Optr));
        Self::new(base, size, flash_type, bank_mode)
    }

    /// Flash start address.
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Total flash size in bytes.
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Bank size in bytes, half the total size.
    pub const fn bank_size(&self) -> u32 {
        self.bank_size
    }

    /// Flash type derived from the device ID.
    pub const fn flash_type(&self) -> FlashType {
        self.flash_type
    }

    /// Configured bank mode.
    pub const fn bank_mode(&self) -> BankMode {
        self.bank_mode
    }

    /// Returns `true` if pages are numbered per bank.
    ///
    /// This is the case for dual bank devices in dual bank mode, and for
    /// 512k devices in either mode.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::geometry::{BankMode, FlashType, Geometry};
    ///
    /// let geo = Geometry::new(0x0800_0000, 0x8_0000, FlashType::DualBank, BankMode::Single);
    /// assert!(geo.dual_bank_addressing());
    /// let geo = Geometry::new(0x0800_0000, 0x4_0000, FlashType::DualBank, BankMode::Single);
    /// assert!(!geo.dual_bank_addressing());
    /// ```
    pub const fn dual_bank_addressing(&self) -> bool {
        match self.flash_type {
            FlashType::SingleBank => false,
            FlashType::DualBank => {
                matches!(self.bank_mode, BankMode::Dual) || self.size == SIZE_512K
            }
        }
    }

    /// Number of banks used for addressing.
    pub const fn bank_count(&self) -> u32 {
        if self.dual_bank_addressing() { 2 } else { 1 }
    }

    /// Number of pages in one addressable bank.
    pub const fn pages_per_bank(&self) -> u32 {
        if self.dual_bank_addressing() {
            self.bank_size / Page::SIZE
        } else {
            self.size / Page::SIZE
        }
    }

    /// Total number of pages.
    pub const fn num_pages(&self) -> u32 {
        self.size / Page::SIZE
    }

    /// Bank containing `addr`.
    pub const fn bank(&self, addr: u32) -> Bank {
        if self.dual_bank_addressing() && addr >= self.base.wrapping_add(self.bank_size) {
            Bank::Bank2
        } else {
            Bank::Bank1
        }
    }

    /// Page containing `addr`.
    ///
    /// `addr` is expected to lie within the flash, addresses outside of it
    /// wrap around.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::geometry::{Bank, BankMode, FlashType, Geometry};
    ///
    /// let geo = Geometry::new(0x0800_0000, 0x4_0000, FlashType::DualBank, BankMode::Dual);
    /// let page = geo.page(0x0802_0800);
    /// assert_eq!(page.bank(), Bank::Bank2);
    /// assert_eq!(page.to_index(), 1);
    ///
    /// let geo = Geometry::new(0x0800_0000, 0x4_0000, FlashType::DualBank, BankMode::Single);
    /// let page = geo.page(0x0802_0800);
    /// assert_eq!(page.bank(), Bank::Bank1);
    /// assert_eq!(page.to_index(), 65);
    /// ```
    pub const fn page(&self, addr: u32) -> Page {
        let mask: u32 = if self.dual_bank_addressing() {
            self.bank_size.wrapping_sub(1)
        } else {
            self.size.wrapping_sub(1)
        };
        Page {
            bank: self.bank(addr),
            idx: ((addr & mask) >> Page::SHIFT) as u16,
        }
    }
}
