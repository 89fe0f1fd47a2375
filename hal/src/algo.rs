//! Flash algorithm operations
//!
//! [`Algorithm`] holds everything an operation needs between the host calls:
//! the register file, the build profile, the main flash geometry and the poll
//! budgets derived from the clock given to [`Algorithm::init`].
//!
//! # Example
//!
//! ```
//! use stm32g0xx_flash::{
//!     algo::{Algorithm, Function},
//!     device,
//!     sim::SimFlash,
//! };
//!
//! let sim = SimFlash::new(0x467, 512, 0xFFFF_FEAA);
//! let mut algo = Algorithm::init(sim, &device::MAIN_512K, 0x0800_0000, 64_000_000, Function::Program);
//! algo.erase_sector(0x0805_0000)?;
//! algo.program_page(0x0805_0000, 8, &[0x11; 8])?;
//! assert_eq!(algo.verify(0x0805_0000, 8, &[0x11; 8]), 0x0805_0008);
//! algo.uninit(Function::Program);
//! assert!(algo.regs().is_locked());
//! # Ok::<(), stm32g0xx_flash::flash::Error>(())
//! ```

use crate::{
    device::{Profile, Region},
    flash::{ERASED_WORD, Error, Flash, PollBudget},
    geometry::Geometry,
    option::{OptionImage, OptionLayout},
    regs::{Reg, RegisterFile, acr},
    watchdog,
};

/// Clock assumed when the host passes `0`, the HSI16 reset clock.
pub const DEFAULT_CLOCK_HZ: u32 = 16_000_000;

/// Function code passed to `Init` and `UnInit`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Function {
    /// Erase.
    Erase = 1,
    /// Program.
    Program = 2,
    /// Verify.
    Verify = 3,
    /// Blank check.
    BlankCheck = 4,
}

impl TryFrom<u32> for Function {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Function::Erase),
            2 => Ok(Function::Program),
            3 => Ok(Function::Verify),
            4 => Ok(Function::BlankCheck),
            _ => Err(code),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Target {
    Main(Geometry),
    Otp,
    Options(OptionLayout),
}

/// Flash algorithm context, created by `Init` and consumed by `UnInit`.
#[derive(Debug)]
pub struct Algorithm<R: RegisterFile> {
    regs: R,
    profile: &'static Profile,
    target: Target,
    program_budget: PollBudget,
    erase_budget: PollBudget,
}

impl<R: RegisterFile> Algorithm<R> {
    /// Prepare the flash controller for the operations of `profile`.
    ///
    /// Interrupts stay disabled until the device is reset by the host.
    /// For main flash `address` is the base the geometry is resolved from.
    /// `function` is informational, `clock_hz` sets the poll budgets (`0`
    /// selects [`DEFAULT_CLOCK_HZ`]).
    pub fn init(
        mut regs: R,
        profile: &'static Profile,
        address: u32,
        clock_hz: u32,
        function: Function,
    ) -> Self {
        debug!(
            "init {} at {:#08X}, {} Hz, function {}",
            profile.device.name, address, clock_hz, function
        );
        regs.disable_interrupts();

        let clock_hz: u32 = if clock_hz == 0 {
            DEFAULT_CLOCK_HZ
        } else {
            clock_hz
        };
        let program_budget: PollBudget =
            PollBudget::from_millis(clock_hz, profile.device.program_timeout_ms);
        let erase_budget: PollBudget =
            PollBudget::from_millis(clock_hz, profile.device.erase_timeout_ms);

        let mut flash: Flash<R> = Flash::unlock(&mut regs);
        if flash.wait_for_not_busy(erase_budget).is_err() {
            warn!("flash still busy at init");
        }
        if matches!(profile.region, Region::Options(_)) {
            flash.unlock_options();
        }

        let target: Target = match profile.region {
            Region::Main => Target::Main(Geometry::probe(&mut regs, address)),
            Region::Otp => Target::Otp,
            Region::Options(layout) => Target::Options(layout),
        };
        if let Target::Main(geo) = target {
            debug!(
                "{} bytes, bank size {}, {} banks",
                geo.size(),
                geo.bank_size(),
                geo.bank_count()
            );
        }

        let stretched: watchdog::Stretched = watchdog::stretch(&mut regs);
        if stretched.iwdg || stretched.wwdg {
            debug!("watchdogs stretched {}", stretched);
        }

        Self {
            regs,
            profile,
            target,
            program_budget,
            erase_budget,
        }
    }

    /// Release the flash controller.
    ///
    /// Locks the flash and, for option bytes, launches the option byte load
    /// which resets the device on hardware.
    pub fn uninit(&mut self, function: Function) {
        debug!("uninit function {}", function);

        if let Target::Main(geo) = self.target {
            // a programmed first word means the boot loader must not see an
            // empty flash after the next reset
            if self.regs.read_word(geo.base()) != ERASED_WORD {
                self.regs.modify(Reg::Acr, |w| w & !acr::EMPTY);
            }
        }

        let budget: PollBudget = self.erase_budget;
        let options: bool = matches!(self.target, Target::Options(_));
        let mut flash: Flash<R> = Flash::new(&mut self.regs);
        flash.lock();
        if options {
            if flash.launch_option_load(budget).is_err() {
                warn!("option byte load did not complete");
            }
            flash.lock_options();
        }
    }

    /// Blank check.
    ///
    /// Always fails so the host erases every sector before programming it,
    /// the ECC of a partially written double-word makes a pattern check
    /// meaningless.
    pub fn blank_check(&mut self, _address: u32, _size: u32, _pattern: u8) -> Result<(), Error> {
        Err(Error::NotBlank)
    }

    /// Erase the whole region.
    ///
    /// For option bytes this restores the factory option values.
    pub fn erase_chip(&mut self) -> Result<(), Error> {
        match self.target {
            Target::Main(geo) => {
                let budget: PollBudget = self.erase_budget.saturating_mul(geo.num_pages());
                Flash::new(&mut self.regs).mass_erase(budget)
            }
            Target::Otp => Err(Error::Unsupported),
            Target::Options(layout) => Flash::new(&mut self.regs)
                .option_program(&OptionImage::factory(layout), self.erase_budget),
        }
    }

    /// Erase the page containing `address`.
    ///
    /// OTP and option bytes have no sectors to erase, the call succeeds
    /// without doing anything.
    pub fn erase_sector(&mut self, address: u32) -> Result<(), Error> {
        match self.target {
            Target::Main(geo) => {
                Flash::new(&mut self.regs).page_erase(geo.page(address), self.erase_budget)
            }
            Target::Otp | Target::Options(_) => Ok(()),
        }
    }

    /// Program `size` bytes of `data` at `address`.
    ///
    /// The size is rounded up to whole double-words, bytes past the end of
    /// `data` are programmed with `0xFF`. For option bytes `data` is the
    /// option image and `address` is ignored.
    pub fn program_page(&mut self, address: u32, size: u32, data: &[u8]) -> Result<(), Error> {
        match self.target {
            Target::Main(_) | Target::Otp => {
                Flash::new(&mut self.regs).program(address, size, data, self.program_budget)
            }
            Target::Options(layout) => {
                let data: &[u8] = data.get(..size as usize).unwrap_or(data);
                let image: OptionImage =
                    OptionImage::from_bytes(layout, data).ok_or(Error::ImageLength)?;
                Flash::new(&mut self.regs).option_program(&image, self.program_budget)
            }
        }
    }

    /// Compare `size` bytes at `address` with `data`.
    ///
    /// Returns the address of the first mismatch, `address + size` if
    /// everything matches.
    ///
    /// Option bytes are compared one register at a time against the masked
    /// image, a mismatch reports the address of the register's word in the
    /// image. An image shorter than the layout reports `address`.
    pub fn verify(&mut self, address: u32, size: u32, data: &[u8]) -> u32 {
        let data: &[u8] = data.get(..size as usize).unwrap_or(data);
        let end: u32 = address.wrapping_add(size);
        match self.target {
            Target::Main(_) | Target::Otp => {
                for (n, &expected) in data.iter().enumerate() {
                    let addr: u32 = address.wrapping_add(n as u32);
                    if self.read_byte(addr) != expected {
                        debug!("verify mismatch at {:#08X}", addr);
                        return addr;
                    }
                }
                end
            }
            Target::Options(layout) => {
                let image: OptionImage = match OptionImage::from_bytes(layout, data) {
                    Some(image) => image,
                    None => return address,
                };
                for (n, (field, expected)) in image.iter().enumerate() {
                    if self.regs.read(field.reg) & field.mask != expected {
                        debug!("option {} mismatch", field.reg);
                        return address.wrapping_add((n as u32) * 4);
                    }
                }
                end
            }
        }
    }

    fn read_byte(&mut self, addr: u32) -> u8 {
        let word: u32 = self.regs.read_word(addr & !0b11);
        word.to_le_bytes()[(addr & 0b11) as usize]
    }

    /// Build profile.
    pub fn profile(&self) -> &'static Profile {
        self.profile
    }

    /// Main flash geometry, `None` for OTP and option bytes.
    pub fn geometry(&self) -> Option<Geometry> {
        match self.target {
            Target::Main(geo) => Some(geo),
            Target::Otp | Target::Options(_) => None,
        }
    }

    /// Access the register file.
    pub fn regs(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the register file without locking the flash.
    pub fn free(self) -> R {
        self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device,
        geometry::{Bank, BankMode, FlashType},
        option::{OPTR_RESET, WRP_MASK},
        regs::{self, cr, optr, sr},
        sim::{Event, SimFlash},
    };

    const CLOCK: u32 = 8_000_000;
    const SINGLE_BANK_OPTR: u32 = OPTR_RESET & !optr::DUAL_BANK;

    fn g0b1(optr: u32) -> SimFlash {
        SimFlash::new(0x467, 512, optr)
    }

    fn main_512k(sim: SimFlash) -> Algorithm<SimFlash> {
        Algorithm::init(sim, &device::MAIN_512K, 0x0800_0000, CLOCK, Function::Program)
    }

    // CR writes that start an erase, OPTLOCK is carried along by CR |= STRT
    fn erase_starts(sim: &SimFlash) -> impl Iterator<Item = u32> + '_ {
        sim.writes(Reg::Cr)
            .filter(|w| w & cr::STRT != 0)
            .map(|w| w & !cr::OPTLOCK)
    }

    fn barrier_after(sim: &SimFlash, event: Event) -> bool {
        sim.events()
            .zip(sim.events().skip(1))
            .any(|(a, b)| a == event && b == Event::Barrier)
    }

    #[test]
    fn function_codes() {
        assert_eq!(Function::try_from(1), Ok(Function::Erase));
        assert_eq!(Function::try_from(3), Ok(Function::Verify));
        assert_eq!(Function::try_from(4), Ok(Function::BlankCheck));
        assert_eq!(Function::try_from(0), Err(0));
        assert_eq!(Function::try_from(5), Err(5));
    }

    #[test]
    fn init_64k_single_bank() {
        let sim = SimFlash::new(0x460, 64, SINGLE_BANK_OPTR);
        let mut algo =
            Algorithm::init(sim, &device::MAIN_64K, 0x0800_0000, CLOCK, Function::Erase);
        let geo: Geometry = algo.geometry().unwrap();
        assert_eq!(geo.flash_type(), FlashType::SingleBank);
        assert_eq!(geo.bank_size(), 0x8000);
        assert_eq!(geo.bank_mode(), BankMode::Single);
        assert_eq!(geo.bank_count(), 1);
        assert_eq!(geo.base(), 0x0800_0000);
        assert!(!algo.regs().is_locked());
        assert!(algo.regs().interrupts_disabled());
    }

    #[test]
    fn base_from_init_address() {
        // flash aliased at 0x0 when booting from main flash
        let algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::MAIN_512K,
            0x0000_0000,
            CLOCK,
            Function::Erase,
        );
        let geo: Geometry = algo.geometry().unwrap();
        assert_eq!(geo.base(), 0x0000_0000);
        assert_eq!(geo.page(0x0004_0000).bank(), Bank::Bank2);
        assert_eq!(geo.page(0x0003_F800).bank(), Bank::Bank1);
    }

    #[test]
    fn key_order() {
        let algo = main_512k(g0b1(OPTR_RESET));
        let sim: SimFlash = algo.free();
        let mut events = sim.events();
        assert_eq!(events.next(), Some(Event::DisableInterrupts));
        assert_eq!(events.next(), Some(Event::Write(Reg::Keyr, regs::KEY1)));
        assert_eq!(events.next(), Some(Event::Write(Reg::Keyr, regs::KEY2)));
        assert!(!sim.key_fault());
        assert_eq!(sim.writes(Reg::Optkeyr).count(), 0);
        assert!(sim.is_options_locked());
    }

    #[test]
    fn option_unlock() {
        let algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OPT_G0X1_DB,
            device::OPTION_START,
            CLOCK,
            Function::Program,
        );
        let sim: SimFlash = algo.free();
        let keys: [u32; 2] = [regs::OPTKEY1, regs::OPTKEY2];
        assert!(sim.writes(Reg::Optkeyr).eq(keys));
        assert!(!sim.is_locked());
        assert!(!sim.is_options_locked());
        assert!(!sim.key_fault());
    }

    #[test]
    fn quirk_512k_single_bank_mode() {
        let mut algo = main_512k(g0b1(SINGLE_BANK_OPTR));
        let geo: Geometry = algo.geometry().unwrap();
        assert_eq!(geo.bank_mode(), BankMode::Single);
        assert!(geo.dual_bank_addressing());

        algo.erase_sector(0x0801_0000).unwrap();
        algo.erase_sector(0x0805_0000).unwrap();
        let sim: SimFlash = algo.free();
        let page32: u32 = cr::PER | (32 << cr::PNB_SHIFT);
        assert!(erase_starts(&sim).eq([page32 | cr::STRT, page32 | cr::BKER | cr::STRT]));
    }

    #[test]
    fn erase_then_read() {
        let mut sim = g0b1(OPTR_RESET);
        sim.preload(0x0805_0000, &[0x00; 16]);
        sim.preload(0x0805_0800, &[0x00; 16]);
        let mut algo = main_512k(sim);

        algo.erase_sector(0x0805_0010).unwrap();
        assert_eq!(algo.verify(0x0805_0000, 16, &[0xFF; 16]), 0x0805_0010);
        assert_eq!(algo.regs().read_word(0x0805_0800), 0);
    }

    #[test]
    fn erase_chip() {
        let mut sim = g0b1(OPTR_RESET);
        sim.preload(0x0800_0000, &[0x00; 8]);
        sim.preload(0x0807_F800, &[0x00; 8]);
        let mut algo = main_512k(sim);

        algo.erase_chip().unwrap();
        assert_eq!(algo.regs().read_word(0x0800_0000), ERASED_WORD);
        assert_eq!(algo.regs().read_word(0x0807_F800), ERASED_WORD);
        let sim: SimFlash = algo.free();
        assert!(erase_starts(&sim).eq([cr::MER1 | cr::MER2 | cr::STRT]));
    }

    #[test]
    fn program_rounds_up() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        let data: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        algo.program_page(0x0800_1000, 10, &data).unwrap();

        let sim: SimFlash = algo.free();
        assert_eq!(sim.double_words(), 2);
        let programs: [Event; 4] = [
            Event::Program(0x0800_1000, 0x0302_0100),
            Event::Program(0x0800_1004, 0x0706_0504),
            Event::Program(0x0800_1008, 0xFFFF_0908),
            Event::Program(0x0800_100C, 0xFFFF_FFFF),
        ];
        assert!(
            sim.events()
                .filter(|e| matches!(e, Event::Program(..)))
                .eq(programs)
        );
        assert_eq!(sim.peek(Reg::Cr) & cr::PG, 0);
    }

    #[test]
    fn erase_sequence() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.regs().clear_events();
        algo.erase_sector(0x0800_0800).unwrap();

        let sim: SimFlash = algo.free();
        let page1: u32 = cr::PER | (1 << cr::PNB_SHIFT);
        let events: [Event; 4] = [
            Event::Write(Reg::Sr, sr::ERRORS),
            Event::Write(Reg::Cr, page1),
            Event::Write(Reg::Cr, page1 | cr::OPTLOCK | cr::STRT),
            Event::Barrier,
        ];
        assert!(sim.events().eq(events));
        assert_eq!(sim.commands(), 1);
    }

    #[test]
    fn program_sequence() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.regs().clear_events();
        algo.program_page(0x0800_0000, 16, &[0x00; 16]).unwrap();

        let sim: SimFlash = algo.free();
        let events: [Event; 9] = [
            Event::Write(Reg::Sr, sr::ERRORS),
            Event::Write(Reg::Cr, cr::PG),
            Event::Program(0x0800_0000, 0),
            Event::Program(0x0800_0004, 0),
            Event::Barrier,
            Event::Program(0x0800_0008, 0),
            Event::Program(0x0800_000C, 0),
            Event::Barrier,
            Event::Write(Reg::Cr, cr::OPTLOCK),
        ];
        assert!(sim.events().eq(events));
        assert_eq!(sim.commands(), 2);
    }

    #[test]
    fn program_rounds_up_from_buffer() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.program_page(0x0800_1000, 10, &[0x5A; 24]).unwrap();
        assert_eq!(algo.regs().read_word(0x0800_100C), 0x5A5A_5A5A);
        assert_eq!(algo.regs().read_word(0x0800_1010), ERASED_WORD);
    }

    #[test]
    fn program_aborts_on_first_failure() {
        let mut sim = g0b1(OPTR_RESET);
        sim.fail_command(1, sr::WRPERR);
        let mut algo = main_512k(sim);

        let data: [u8; 24] = [0xA5; 24];
        assert_eq!(algo.program_page(0x0800_2000, 10, &data), Err(Error::Wp));
        let sim: SimFlash = algo.free();
        assert_eq!(sim.double_words(), 1);
        assert_eq!(
            sim.events()
                .filter(|e| matches!(e, Event::Program(..)))
                .count(),
            4
        );
        assert_eq!(sim.peek(Reg::Sr) & sr::ERRORS, 0);
        assert_eq!(sim.peek(Reg::Cr) & cr::PG, 0);
    }

    #[test]
    fn program_over_data() {
        let mut sim = g0b1(OPTR_RESET);
        sim.preload(0x0800_0000, &[0x12; 8]);
        let mut algo = main_512k(sim);
        assert_eq!(algo.program_page(0x0800_0000, 8, &[0x34; 8]), Err(Error::Prog));
    }

    #[test]
    fn short_buffer_padded() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.program_page(0x0800_0000, 8, &[0x55; 3]).unwrap();
        assert_eq!(algo.regs().read_word(0x0800_0000), 0xFF55_5555);
        assert_eq!(algo.regs().read_word(0x0800_0004), ERASED_WORD);
    }

    #[test]
    fn short_buffer_padded_to_size() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.program_page(0x0800_0000, 16, &[0x55; 3]).unwrap();

        let sim: SimFlash = algo.free();
        assert_eq!(sim.double_words(), 2);
        let programs: [Event; 4] = [
            Event::Program(0x0800_0000, 0xFF55_5555),
            Event::Program(0x0800_0004, ERASED_WORD),
            Event::Program(0x0800_0008, ERASED_WORD),
            Event::Program(0x0800_000C, ERASED_WORD),
        ];
        assert!(
            sim.events()
                .filter(|e| matches!(e, Event::Program(..)))
                .eq(programs)
        );
    }

    #[test]
    fn blank_check_fails() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        assert_eq!(algo.blank_check(0x0800_0000, 0x800, 0xFF), Err(Error::NotBlank));
        assert_eq!(Error::NotBlank.code().get(), 1);
    }

    #[test]
    fn stuck_busy_times_out() {
        let mut sim = g0b1(OPTR_RESET);
        sim.set_stuck_busy(true);
        let mut algo = Algorithm::init(sim, &device::MAIN_512K, 0x0800_0000, 4000, Function::Erase);
        assert_eq!(algo.erase_sector(0x0800_0000), Err(Error::Timeout));
        assert_eq!(algo.program_page(0x0800_0000, 8, &[0; 8]), Err(Error::Timeout));
    }

    #[test]
    fn busy_polls_complete() {
        let sim = g0b1(OPTR_RESET).with_busy_polls(100);
        let mut algo = main_512k(sim);
        algo.erase_sector(0x0800_0000).unwrap();
        algo.program_page(0x0800_0000, 8, &[0; 8]).unwrap();
    }

    #[test]
    fn stale_errors_cleared() {
        let mut sim = g0b1(OPTR_RESET);
        sim.set_sr(sr::PGSERR | sr::PROGERR);
        let mut algo = main_512k(sim);
        algo.erase_sector(0x0800_0000).unwrap();
    }

    #[test]
    fn uninit_main() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.program_page(0x0800_0000, 8, &[0; 8]).unwrap();
        algo.uninit(Function::Program);

        let sim: SimFlash = algo.free();
        assert!(sim.is_locked());
        assert_eq!(sim.peek(Reg::Acr) & acr::EMPTY, 0);
        assert_eq!(sim.option_loads(), 0);
        assert_eq!(sim.writes(Reg::Cr).last(), Some(cr::LOCK | cr::OPTLOCK));
        assert!(barrier_after(&sim, Event::Write(Reg::Cr, cr::LOCK | cr::OPTLOCK)));
        assert_eq!(sim.events().last(), Some(Event::Barrier));
    }

    #[test]
    fn uninit_keeps_empty_flag_on_erased_flash() {
        let mut algo = main_512k(g0b1(OPTR_RESET));
        algo.uninit(Function::Erase);
        assert_ne!(algo.regs().peek(Reg::Acr) & acr::EMPTY, 0);
    }

    #[test]
    fn uninit_options() {
        let mut algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OPT_G0X1_DB,
            device::OPTION_START,
            CLOCK,
            Function::Program,
        );
        algo.uninit(Function::Program);

        let sim: SimFlash = algo.free();
        let tail: [u32; 3] = [cr::LOCK, cr::OBL_LAUNCH, cr::OPTLOCK];
        assert!(sim.writes(Reg::Cr).eq(tail));
        for bits in tail {
            assert!(barrier_after(&sim, Event::Write(Reg::Cr, bits)));
        }
        assert_eq!(sim.option_loads(), 1);
        assert!(sim.is_locked());
        assert!(sim.is_options_locked());
        // the option load leaves the empty flag alone
        assert_ne!(sim.peek(Reg::Acr) & acr::EMPTY, 0);
    }

    #[test]
    fn option_erase_chip() {
        let mut algo = Algorithm::init(
            g0b1(0x0000_0000),
            &device::OPT_G0X0_SB,
            device::OPTION_START,
            CLOCK,
            Function::Erase,
        );
        algo.regs().clear_events();
        algo.erase_chip().unwrap();

        let sim: SimFlash = algo.free();
        let writes: [Event; 5] = [
            Event::Write(Reg::Sr, sr::ERRORS),
            Event::Write(Reg::Optr, 0xFFFF_FEAA),
            Event::Write(Reg::Wrp1ar, 0x0000_007F),
            Event::Write(Reg::Wrp1br, 0x0000_007F),
            Event::Write(Reg::Cr, cr::OPTSTRT),
        ];
        assert!(
            sim.events()
                .filter(|e| matches!(e, Event::Write(..)))
                .eq(writes)
        );
        assert!(barrier_after(&sim, Event::Write(Reg::Cr, cr::OPTSTRT)));
        assert_eq!(sim.option_programs(), 1);
        assert_eq!(sim.peek(Reg::Optr), OPTR_RESET);
    }

    #[test]
    fn option_program_masks() {
        let mut algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OPT_G0X0_DB,
            device::OPTION_START,
            CLOCK,
            Function::Program,
        );
        let image: [u8; 20] = [0xFF; 20];
        algo.program_page(device::OPTION_START, 20, &image).unwrap();

        let sim: SimFlash = algo.free();
        assert_eq!(sim.peek(Reg::Optr), 0x3F7F_FFFF);
        assert_eq!(sim.peek(Reg::Wrp1ar), WRP_MASK);
        assert_eq!(sim.peek(Reg::Wrp2br), WRP_MASK);
        assert_eq!(sim.option_programs(), 1);
    }

    #[test]
    fn option_program_short_image() {
        let mut algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OPT_G0X1_SB,
            device::OPTION_START,
            CLOCK,
            Function::Program,
        );
        assert_eq!(
            algo.program_page(device::OPTION_START, 32, &[0xFF; 28]),
            Err(Error::ImageLength)
        );
        assert_eq!(algo.regs().option_programs(), 0);
    }

    #[test]
    fn option_verify() {
        let mut algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OPT_G0X0_SB,
            device::OPTION_START,
            CLOCK,
            Function::Verify,
        );
        let mut image: [u8; 12] = [0; 12];
        image[0..4].copy_from_slice(&0xFFFF_FEAAu32.to_le_bytes());
        image[4..8].copy_from_slice(&0x0000_007Fu32.to_le_bytes());
        image[8..12].copy_from_slice(&0x0000_007Fu32.to_le_bytes());
        algo.program_page(device::OPTION_START, 12, &image).unwrap();

        let start: u32 = device::OPTION_START;
        assert_eq!(algo.verify(start, 12, &image), start + 12);

        image[8] = 0x10;
        assert_eq!(algo.verify(start, 12, &image), start + 8);
        assert_eq!(algo.verify(start, 8, &image), start);
    }

    #[test]
    fn otp() {
        let mut algo = Algorithm::init(
            g0b1(OPTR_RESET),
            &device::OTP,
            device::OTP_START,
            CLOCK,
            Function::Program,
        );
        assert_eq!(algo.geometry(), None);
        assert_eq!(algo.erase_chip(), Err(Error::Unsupported));
        algo.erase_sector(device::OTP_START).unwrap();

        let data: [u8; 8] = *b"serial01";
        algo.program_page(device::OTP_START + 8, 8, &data).unwrap();
        assert_eq!(algo.verify(device::OTP_START + 8, 8, &data), device::OTP_START + 16);
        assert_eq!(algo.verify(device::OTP_START + 8, 8, b"serial02"), device::OTP_START + 15);

        algo.uninit(Function::Program);
        assert_eq!(algo.regs().option_loads(), 0);
    }

    #[test]
    fn hardware_watchdogs() {
        let opt: u32 = OPTR_RESET & !(optr::IWDG_SW | optr::WWDG_SW);
        let algo = main_512k(g0b1(opt));
        let sim: SimFlash = algo.free();
        assert!(sim.writes(Reg::IwdgKr).eq([0xAAAA, 0x5555]));
        assert_eq!(sim.peek(Reg::IwdgPr), 6);
        assert_eq!(sim.peek(Reg::IwdgRlr), 0xFFF);
        assert_eq!(sim.peek(Reg::WwdgCfr), 0x1FF);
        assert_eq!(sim.peek(Reg::WwdgCr), 0x7F);
    }

    #[test]
    fn software_watchdogs() {
        let algo = main_512k(g0b1(OPTR_RESET));
        let sim: SimFlash = algo.free();
        assert_eq!(sim.writes(Reg::IwdgKr).count(), 0);
        assert_eq!(sim.writes(Reg::WwdgCr).count(), 0);
        assert_eq!(sim.writes(Reg::WwdgCfr).count(), 0);
    }
}
