//! Device electronic signature

use crate::regs::{Reg, RegisterFile};

/// Device line, from the `DEV_ID` field of `DBGMCU_IDCODE`.
///
/// Returned by [`device_id`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum DeviceId {
    /// STM32G050xx, STM32G051xx, STM32G061xx
    G05x = 0x456,
    /// STM32G070xx, STM32G071xx, STM32G081xx
    G07x = 0x460,
    /// STM32G030xx
    G03x = 0x466,
    /// STM32G0B0xx, STM32G0B1xx, STM32G0C1xx
    G0Bx = 0x467,
}

impl TryFrom<u16> for DeviceId {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x456 => Ok(DeviceId::G05x),
            0x460 => Ok(DeviceId::G07x),
            0x466 => Ok(DeviceId::G03x),
            0x467 => Ok(DeviceId::G0Bx),
            _ => Err(value),
        }
    }
}

impl From<DeviceId> for u16 {
    fn from(id: DeviceId) -> Self {
        id as u16
    }
}

impl DeviceId {
    /// Returns `true` if the line only has a single flash bank.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::info::DeviceId;
    ///
    /// assert!(DeviceId::G07x.is_single_bank());
    /// assert!(!DeviceId::G0Bx.is_single_bank());
    /// ```
    pub const fn is_single_bank(&self) -> bool {
        matches!(self, DeviceId::G05x | DeviceId::G07x | DeviceId::G03x)
    }
}

/// Get the raw 12-bit device ID.
///
/// If the value is unknown it will be returned in the `Err` variant of the
/// `Result`.
///
/// # Example
///
/// ```no_run
/// use stm32g0xx_flash::{info, regs::Mmio};
///
/// let mut regs: Mmio = unsafe { Mmio::steal() };
/// // valid for the NUCLEO-G0B1RE
/// assert_eq!(info::device_id(&mut regs), Ok(info::DeviceId::G0Bx));
/// ```
pub fn device_id<R: RegisterFile>(regs: &mut R) -> Result<DeviceId, u16> {
    let raw: u16 = (regs.read(Reg::DbgmcuIdcode) & 0xFFF) as u16;
    DeviceId::try_from(raw)
}

/// Flash size in kibibytes
///
/// # Example
///
/// ```no_run
/// use stm32g0xx_flash::{info::flash_size_kibibyte, regs::Mmio};
///
/// let mut regs: Mmio = unsafe { Mmio::steal() };
/// // valid for the NUCLEO-G0B1RE
/// assert_eq!(flash_size_kibibyte(&mut regs), 512);
/// ```
pub fn flash_size_kibibyte<R: RegisterFile>(regs: &mut R) -> u16 {
    (regs.read(Reg::FlashSize) & 0xFFFF) as u16
}

/// Flash size in bytes
pub fn flash_size<R: RegisterFile>(regs: &mut R) -> u32 {
    u32::from(flash_size_kibibyte(regs)) << 10
}
