#![no_std]
#![no_main]

use core::ptr::read_volatile;
use defmt::unwrap;
use defmt_rtt as _; // global logger
use panic_probe as _;
use stm32g0xx_flash::{
    algo::{Algorithm, Function},
    cortex_m,
    device,
    flash::{Error, ERASED_WORD},
    geometry::{Bank, Geometry, Page},
    regs::{Mmio, Reg, RegisterFile, cr},
};

// upper bank, away from the test image
// flash only gets 10k program cycles, move this if a board wears out
const PAGE_ADDR: u32 = 0x0807_0000;

// HSI16 after reset
const CLOCK: u32 = 16_000_000;

#[cortex_m_rt::exception]
#[allow(non_snake_case)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    cortex_m::interrupt::disable();
    defmt::error!("HardFault {:#}", defmt::Debug2Format(ef));
    defmt::flush();
    loop {
        cortex_m::asm::udf()
    }
}

fn algo(function: Function) -> Algorithm<Mmio> {
    let regs: Mmio = unsafe { Mmio::steal() };
    Algorithm::init(regs, &device::MAIN_512K, device::FLASH_START, CLOCK, function)
}

fn read(addr: u32) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

#[defmt_test::tests]
mod tests {
    use super::*;

    #[init]
    fn init() {
        defmt::info!("Testing with page at {:#08X}", PAGE_ADDR);
    }

    #[test]
    fn geometry() {
        let algo: Algorithm<Mmio> = algo(Function::Erase);
        let geo: Geometry = unwrap!(algo.geometry());
        defmt::debug!("{}", geo);
        defmt::assert_eq!(geo.size(), 512 * 1024);
        defmt::assert_eq!(geo.bank_size(), 256 * 1024);
        defmt::assert!(geo.dual_bank_addressing());
        defmt::assert_eq!(geo.page(PAGE_ADDR).bank(), Bank::Bank2);
        defmt::assert_eq!(geo.page(PAGE_ADDR).to_index(), 96);

        let mut regs: Mmio = algo.free();
        regs.modify(Reg::Cr, |w| w | cr::LOCK);

        // ensure previous logs are seen before we start executing code that can
        // result in difficult-to-debug situations
        defmt::flush();
    }

    #[test]
    fn page_erase() {
        defmt::debug!("data at page start before erase: {:#08X}", read(PAGE_ADDR));

        let mut algo: Algorithm<Mmio> = algo(Function::Erase);
        unwrap!(algo.erase_sector(PAGE_ADDR));
        algo.uninit(Function::Erase);

        for addr in (PAGE_ADDR..PAGE_ADDR + Page::SIZE).step_by(4) {
            defmt::assert_eq!(read(addr), ERASED_WORD);
        }
    }

    #[test]
    fn program_page() {
        let mut data: [u8; 1024] = [0; 1024];
        data.iter_mut()
            .enumerate()
            .for_each(|(n, byte)| *byte = (n as u8) ^ 0x5A);

        let mut algo: Algorithm<Mmio> = algo(Function::Program);
        unwrap!(algo.program_page(PAGE_ADDR, data.len() as u32, &data));
        defmt::assert_eq!(
            algo.verify(PAGE_ADDR, data.len() as u32, &data),
            PAGE_ADDR + data.len() as u32
        );
        algo.uninit(Function::Program);

        defmt::assert_eq!(
            read(PAGE_ADDR),
            u32::from_le_bytes([data[0], data[1], data[2], data[3]])
        );
    }

    #[test]
    fn program_rounds_up() {
        let addr: u32 = PAGE_ADDR + 1024;
        let data: [u8; 10] = [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19];

        let mut algo: Algorithm<Mmio> = algo(Function::Program);
        unwrap!(algo.program_page(addr, 10, &data));
        algo.uninit(Function::Program);

        defmt::assert_eq!(read(addr + 8), 0xFFFF_1918);
        defmt::assert_eq!(read(addr + 12), ERASED_WORD);
    }

    #[test]
    fn program_twice_fails() {
        let addr: u32 = PAGE_ADDR + 1024;

        let mut algo: Algorithm<Mmio> = algo(Function::Program);
        defmt::assert_eq!(algo.program_page(addr, 8, &[0xA5; 8]), Err(Error::Prog));
        algo.uninit(Function::Program);
    }

    #[test]
    fn blank_check_fails() {
        let mut algo: Algorithm<Mmio> = algo(Function::Erase);
        defmt::assert_eq!(
            algo.blank_check(PAGE_ADDR, Page::SIZE, 0xFF),
            Err(Error::NotBlank)
        );
        algo.uninit(Function::Erase);
    }

    #[test]
    fn erase_after_program() {
        let mut algo: Algorithm<Mmio> = algo(Function::Erase);
        unwrap!(algo.erase_sector(PAGE_ADDR));
        defmt::assert_eq!(
            algo.verify(PAGE_ADDR, 16, &[0xFF; 16]),
            PAGE_ADDR + 16
        );
        algo.uninit(Function::Erase);

        let mut regs: Mmio = unsafe { Mmio::steal() };
        defmt::assert_ne!(regs.read(Reg::Cr) & cr::LOCK, 0);
    }
}
