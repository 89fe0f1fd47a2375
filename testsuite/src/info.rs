#![no_std]
#![no_main]

use defmt::unwrap;
use defmt_rtt as _; // global logger
use panic_probe as _;
use stm32g0xx_flash::{
    geometry::{FlashType, Geometry},
    info::{self, DeviceId},
    regs::{Mmio, Reg, RegisterFile, optr},
};

#[defmt_test::tests]
mod tests {
    use super::*;

    #[init]
    fn init() -> Mmio {
        unsafe { Mmio::steal() }
    }

    #[test]
    fn device_id(regs: &mut Mmio) {
        let id: DeviceId = unwrap!(info::device_id(regs).ok());
        defmt::assert_eq!(id, DeviceId::G0Bx);
        defmt::assert!(!id.is_single_bank());
    }

    #[test]
    fn flash_size(regs: &mut Mmio) {
        defmt::assert_eq!(info::flash_size_kibibyte(regs), 512);
        defmt::assert_eq!(info::flash_size(regs), 512 * 1024);
    }

    #[test]
    fn geometry(regs: &mut Mmio) {
        let geo: Geometry = Geometry::probe(regs, 0x0800_0000);
        defmt::info!("OPTR={:#08X} {}", regs.read(Reg::Optr), geo);
        defmt::assert_eq!(geo.flash_type(), FlashType::DualBank);
        defmt::assert!(geo.dual_bank_addressing());
        defmt::assert_eq!(geo.bank_count(), 2);
        defmt::assert_eq!(geo.pages_per_bank(), 128);
    }

    #[test]
    fn software_watchdogs(regs: &mut Mmio) {
        // NUCLEO boards ship with both watchdogs in software mode
        let opt: u32 = regs.read(Reg::Optr);
        defmt::assert_ne!(opt & optr::IWDG_SW, 0);
        defmt::assert_ne!(opt & optr::WWDG_SW, 0);
    }
}
