//! Device descriptors
//!
//! One [`Profile`] exists for each flash algorithm build: the memory region
//! it programs and the descriptor the host reads from the algorithm image.

use crate::option::OptionLayout;

/// Start address of the main flash.
pub const FLASH_START: u32 = 0x0800_0000;
/// Start address of the OTP area.
pub const OTP_START: u32 = 0x1FFF_7000;
/// Start address of the option bytes.
pub const OPTION_START: u32 = 0x1FFF_7800;

/// Memory region programmed by a profile.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    /// Main flash memory.
    Main,
    /// One-time programmable area.
    Otp,
    /// Option bytes with the given register layout.
    Options(OptionLayout),
}

/// Device description read by the host.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashDevice {
    /// Device name shown by the host.
    pub name: &'static str,
    /// Start address.
    pub start: u32,
    /// Size in bytes.
    pub size: u32,
    /// Size of the buffer passed to `ProgramPage`.
    pub page_size: u32,
    /// Value of an erased byte.
    pub empty: u8,
    /// `ProgramPage` timeout in milliseconds.
    pub program_timeout_ms: u32,
    /// `EraseSector` timeout in milliseconds.
    pub erase_timeout_ms: u32,
    /// Erase sector size in bytes.
    pub sector_size: u32,
}

/// Flash algorithm build profile.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Profile {
    /// Region programmed.
    pub region: Region,
    /// Descriptor for the host.
    pub device: FlashDevice,
}

const fn main(name: &'static str, size: u32) -> Profile {
    Profile {
        region: Region::Main,
        device: FlashDevice {
            name,
            start: FLASH_START,
            size,
            page_size: 1024,
            empty: 0xFF,
            program_timeout_ms: 400,
            erase_timeout_ms: 400,
            sector_size: 0x800,
        },
    }
}

const fn options(name: &'static str, layout: OptionLayout) -> Profile {
    let size: u32 = layout.image_len() as u32;
    Profile {
        region: Region::Options(layout),
        device: FlashDevice {
            name,
            start: OPTION_START,
            size,
            page_size: size,
            empty: 0xFF,
            program_timeout_ms: 3000,
            erase_timeout_ms: 3000,
            sector_size: size,
        },
    }
}

/// 16 KiB main flash.
pub const MAIN_16K: Profile = main("STM32G0xx 16 KB Flash", 0x4000);
/// 32 KiB main flash.
pub const MAIN_32K: Profile = main("STM32G0xx 32 KB Flash", 0x8000);
/// 64 KiB main flash.
pub const MAIN_64K: Profile = main("STM32G0xx 64 KB Flash", 0x1_0000);
/// 128 KiB main flash.
pub const MAIN_128K: Profile = main("STM32G0xx 128 KB Flash", 0x2_0000);
/// 256 KiB main flash, STM32G0Bx/G0Cx.
pub const MAIN_256K: Profile = main("STM32G0Bx_256", 0x4_0000);
/// 512 KiB main flash, STM32G0Bx/G0Cx.
pub const MAIN_512K: Profile = main("STM32G0Bx_512", 0x8_0000);

/// 1 KiB OTP area.
pub const OTP: Profile = Profile {
    region: Region::Otp,
    device: FlashDevice {
        name: "STM32G0xx Flash OTP",
        start: OTP_START,
        size: 0x400,
        page_size: 1024,
        empty: 0xFF,
        program_timeout_ms: 3000,
        erase_timeout_ms: 3000,
        sector_size: 0x400,
    },
};

/// Option bytes of single bank G0x0 devices.
pub const OPT_G0X0_SB: Profile = options("STM32G0x0 SB Flash Options", OptionLayout::G0X0_SB);
/// Option bytes of dual bank G0x0 devices.
pub const OPT_G0X0_DB: Profile = options("STM32G0x0 DB Flash Options", OptionLayout::G0X0_DB);
/// Option bytes of single bank G0x1 devices.
pub const OPT_G0X1_SB: Profile = options("STM32G0x1 SB Flash Options", OptionLayout::G0X1_SB);
/// Option bytes of dual bank G0x1 devices.
pub const OPT_G0X1_DB: Profile = options("STM32G0x1 DB Flash Options", OptionLayout::G0X1_DB);

/// Every supported profile.
pub static CATALOG: [Profile; 11] = [
    MAIN_16K,
    MAIN_32K,
    MAIN_64K,
    MAIN_128K,
    MAIN_256K,
    MAIN_512K,
    OTP,
    OPT_G0X0_SB,
    OPT_G0X0_DB,
    OPT_G0X1_SB,
    OPT_G0X1_DB,
];

impl Profile {
    /// Look up a profile by device name.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::device::{self, Profile};
    ///
    /// assert_eq!(Profile::by_name("STM32G0Bx_512"), Some(&device::MAIN_512K));
    /// assert_eq!(Profile::by_name("STM32G4xx"), None);
    /// ```
    pub fn by_name(name: &str) -> Option<&'static Profile> {
        CATALOG.iter().find(|profile| profile.device.name == name)
    }

    /// Address one past the end of the region.
    pub const fn end(&self) -> u32 {
        self.device.start + self.device.size
    }

    /// Returns `true` if `addr` lies within the region.
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.device.start && addr < self.end()
    }
}
