#![no_std]
#![no_main]

use flash_algorithm::*;
use stm32g0xx_flash::{
    algo,
    device::{self, Profile},
    regs::Mmio,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "main-16k")] {
        const PROFILE: &Profile = &device::MAIN_16K;
    } else if #[cfg(feature = "main-32k")] {
        const PROFILE: &Profile = &device::MAIN_32K;
    } else if #[cfg(feature = "main-64k")] {
        const PROFILE: &Profile = &device::MAIN_64K;
    } else if #[cfg(feature = "main-128k")] {
        const PROFILE: &Profile = &device::MAIN_128K;
    } else if #[cfg(feature = "main-256k")] {
        const PROFILE: &Profile = &device::MAIN_256K;
    } else if #[cfg(feature = "main-512k")] {
        const PROFILE: &Profile = &device::MAIN_512K;
    } else if #[cfg(feature = "otp")] {
        const PROFILE: &Profile = &device::OTP;
    } else if #[cfg(feature = "opt-g0x0-sb")] {
        const PROFILE: &Profile = &device::OPT_G0X0_SB;
    } else if #[cfg(feature = "opt-g0x0-db")] {
        const PROFILE: &Profile = &device::OPT_G0X0_DB;
    } else if #[cfg(feature = "opt-g0x1-sb")] {
        const PROFILE: &Profile = &device::OPT_G0X1_SB;
    } else if #[cfg(feature = "opt-g0x1-db")] {
        const PROFILE: &Profile = &device::OPT_G0X1_DB;
    } else {
        core::compile_error!("You must select a device profile with a feature flag");
    }
}

algorithm!(Algorithm, {
    device_name: PROFILE.device.name,
    device_type: DeviceType::Onchip,
    flash_address: PROFILE.device.start,
    flash_size: PROFILE.device.size,
    page_size: PROFILE.device.page_size,
    empty_value: PROFILE.device.empty,
    program_time_out: PROFILE.device.program_timeout_ms,
    erase_time_out: PROFILE.device.erase_timeout_ms,
    sectors: [{
        size: PROFILE.device.sector_size,
        address: 0x0,
    }]
});

struct Algorithm {
    inner: algo::Algorithm<Mmio>,
    function: algo::Function,
}

impl FlashAlgorithm for Algorithm {
    fn new(address: u32, clock: u32, function: Function) -> Result<Self, ErrorCode> {
        let function: algo::Function = match function {
            Function::Erase => algo::Function::Erase,
            Function::Program => algo::Function::Program,
            Function::Verify => algo::Function::Verify,
            Function::BlankCheck => algo::Function::BlankCheck,
        };
        // safety: the host halts the core and runs one entry point at a time
        let regs: Mmio = unsafe { Mmio::steal() };
        Ok(Self {
            inner: algo::Algorithm::init(regs, PROFILE, address, clock, function),
            function,
        })
    }

    fn erase_all(&mut self) -> Result<(), ErrorCode> {
        self.inner.erase_chip().map_err(|e| e.code())
    }

    fn erase_sector(&mut self, addr: u32) -> Result<(), ErrorCode> {
        self.inner.erase_sector(addr).map_err(|e| e.code())
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), ErrorCode> {
        let size: u32 = data.len() as u32;
        self.inner
            .program_page(addr, size, data)
            .map_err(|e| e.code())
    }

    fn blank_check(&mut self, addr: u32, size: u32, pattern: u8) -> Result<(), ErrorCode> {
        self.inner
            .blank_check(addr, size, pattern)
            .map_err(|e| e.code())
    }

    #[cfg(feature = "verify")]
    fn verify(&mut self, addr: u32, size: u32, data: Option<&[u8]>) -> Result<(), u32> {
        let data: &[u8] = match data {
            Some(data) => data,
            None => return Ok(()),
        };
        let next: u32 = self.inner.verify(addr, size, data);
        if next == addr.wrapping_add(size) {
            Ok(())
        } else {
            Err(next)
        }
    }
}

impl Drop for Algorithm {
    fn drop(&mut self) {
        self.inner.uninit(self.function);
    }
}
