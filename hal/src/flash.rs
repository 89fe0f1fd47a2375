//! Flash memory

use crate::{
    geometry::Page,
    option::OptionImage,
    regs::{self, Reg, RegisterFile, cr, sr},
};
use core::num::NonZeroU32;

/// Erased value of a flash word.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Flash errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Operation error.
    ///
    /// Set when an operation did not complete successfully with the end of
    /// operation interrupt enabled.
    Op,
    /// Programming error.
    ///
    /// A 64-bit address to be programmed contains a value different from
    /// `0xFFFF_FFFF_FFFF_FFFF` before programming, except if the data to write
    /// is `0x0000_0000_0000_0000`.
    Prog,
    /// Write protection error.
    ///
    /// An address to be erased/programmed belongs to a write-protected part
    /// (by WRP, PCROP or RDP level 1) of the flash memory.
    Wp,
    /// Programming alignment error.
    ///
    /// The data to program cannot be contained in the same double-word
    /// (`u64`) of flash memory.
    Align,
    /// Size error.
    ///
    /// The size of the access is a byte (`u8`) or half-word (`u16`) during a
    /// program sequence.
    Size,
    /// Programming sequence error.
    ///
    /// A write access to the flash memory is performed while `PG` has not
    /// been set, or a previous programming error is still pending.
    Seq,
    /// Fast programming data miss error.
    Miss,
    /// Fast programming error.
    Fast,
    /// PCROP read error.
    Read,
    /// Option validity error.
    ///
    /// The option bytes loaded at the last option byte load did not match
    /// their complement.
    OptValid,
    /// The busy flag did not clear within the poll budget.
    Timeout,
    /// Blank check always fails, every sector is erased before programming.
    NotBlank,
    /// The option byte image is shorter than the option register layout.
    ImageLength,
    /// The operation does not exist for this memory region.
    Unsupported,
}

impl Error {
    /// Decode the error flags of a status register value.
    ///
    /// Returns `None` if no error flag is set.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::{flash::Error, regs::sr};
    ///
    /// assert_eq!(Error::from_sr(sr::EOP), None);
    /// assert_eq!(Error::from_sr(sr::WRPERR | sr::PGSERR), Some(Error::Wp));
    /// assert_eq!(Error::from_sr(sr::PGSERR), Some(Error::Seq));
    /// ```
    pub const fn from_sr(bits: u32) -> Option<Self> {
        if bits & sr::PROGERR != 0 {
            Some(Error::Prog)
        } else if bits & sr::WRPERR != 0 {
            Some(Error::Wp)
        } else if bits & sr::PGAERR != 0 {
            Some(Error::Align)
        } else if bits & sr::SIZERR != 0 {
            Some(Error::Size)
        } else if bits & sr::MISSERR != 0 {
            Some(Error::Miss)
        } else if bits & sr::FASTERR != 0 {
            Some(Error::Fast)
        } else if bits & sr::RDERR != 0 {
            Some(Error::Read)
        } else if bits & sr::OPTVERR != 0 {
            Some(Error::OptValid)
        } else if bits & sr::OPERR != 0 {
            Some(Error::Op)
        } else if bits & sr::PGSERR != 0 {
            // check last because it can be set with other flags
            Some(Error::Seq)
        } else {
            None
        }
    }

    /// Status code reported to the host.
    ///
    /// The host only distinguishes success (`0`) from failure (`1`).
    pub const fn code(self) -> NonZeroU32 {
        NonZeroU32::MIN
    }
}

/// Upper bound on the number of busy flag polls.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget(u32);

impl PollBudget {
    /// Lower bound of CPU cycles spent on each poll.
    ///
    /// Underestimating the cost of a poll makes the budget last longer than
    /// the requested time, never shorter.
    pub const CYCLES_PER_POLL: u32 = 4;

    /// Create a budget from a number of polls.
    pub const fn from_polls(polls: u32) -> Self {
        if polls == 0 {
            Self(1)
        } else {
            Self(polls)
        }
    }

    /// Create a budget lasting at least `ms` milliseconds at `clock_hz`.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::flash::PollBudget;
    ///
    /// assert_eq!(PollBudget::from_millis(16_000_000, 400).polls(), 1_600_000);
    /// assert_eq!(PollBudget::from_millis(0, 400).polls(), 1);
    /// assert_eq!(PollBudget::from_millis(64_000_000, u32::MAX).polls(), u32::MAX);
    /// ```
    pub const fn from_millis(clock_hz: u32, ms: u32) -> Self {
        let cycles: u64 = (clock_hz as u64 / 1000) * ms as u64;
        let polls: u64 = cycles / Self::CYCLES_PER_POLL as u64;
        if polls > u32::MAX as u64 {
            Self(u32::MAX)
        } else {
            Self::from_polls(polls as u32)
        }
    }

    /// Number of polls.
    pub const fn polls(&self) -> u32 {
        self.0
    }

    /// Scale the budget, saturating at `u32::MAX` polls.
    #[must_use = "saturating_mul returns a new PollBudget"]
    pub const fn saturating_mul(self, n: u32) -> Self {
        Self::from_polls(self.0.saturating_mul(n))
    }
}

/// Flash command driver.
///
/// Wraps a register file with the command protocol of the flash controller:
/// clear the error flags, start the command, synchronize, wait for the busy
/// flags to clear, then check and clear the error flags.
#[derive(Debug)]
pub struct Flash<'a, R: RegisterFile> {
    regs: &'a mut R,
}

impl<'a, R: RegisterFile> Flash<'a, R> {
    /// Wrap a register file without touching the lock state.
    pub fn new(regs: &'a mut R) -> Self {
        Self { regs }
    }

    /// Unlock the flash memory for program or erase operations.
    ///
    /// Writing the keys when the flash is already unlocked has no effect.
    pub fn unlock(regs: &'a mut R) -> Self {
        regs.write(Reg::Keyr, regs::KEY1);
        regs.write(Reg::Keyr, regs::KEY2);
        Self { regs }
    }

    /// Unlock the option registers.
    ///
    /// The flash memory must be unlocked first.
    pub fn unlock_options(&mut self) {
        self.regs.write(Reg::Optkeyr, regs::OPTKEY1);
        self.regs.write(Reg::Optkeyr, regs::OPTKEY2);
    }

    /// Lock the flash memory.
    pub fn lock(&mut self) {
        self.regs.modify(Reg::Cr, |w| w | cr::LOCK);
        self.regs.dsb();
    }

    /// Lock the option registers.
    pub fn lock_options(&mut self) {
        self.regs.write(Reg::Cr, cr::OPTLOCK);
        self.regs.dsb();
    }

    /// Force the option byte loading.
    ///
    /// On hardware this resets the device, the call only returns if the
    /// reset did not happen.
    pub fn launch_option_load(&mut self, budget: PollBudget) -> Result<(), Error> {
        self.regs.write(Reg::Cr, cr::OBL_LAUNCH);
        self.regs.dsb();

        for _ in 0..budget.polls() {
            if self.regs.read(Reg::Cr) & cr::OBL_LAUNCH == 0 {
                return Ok(());
            }
            self.regs.nop();
        }
        Err(Error::Timeout)
    }

    fn sr(&mut self) -> u32 {
        self.regs.read(Reg::Sr)
    }

    /// Clear all error flags in the status register.
    pub fn clear_all_err(&mut self) {
        self.regs.write(Reg::Sr, sr::ERRORS)
    }

    /// Poll until neither bank is busy.
    pub fn wait_for_not_busy(&mut self, budget: PollBudget) -> Result<(), Error> {
        for _ in 0..budget.polls() {
            // "This bit is set at the beginning of a Flash operation and
            // reset when the operation finishes or when an error occurs."
            if self.sr() & sr::BSY == 0 {
                return Ok(());
            }
            self.regs.nop();
        }
        warn!("flash busy after {} polls", budget.polls());
        Err(Error::Timeout)
    }

    fn check_err(&mut self) -> Result<(), Error> {
        let sr: u32 = self.sr();
        match Error::from_sr(sr) {
            Some(err) => {
                debug!("flash error {}, SR={:#08X}", err, sr);
                self.clear_all_err();
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn complete(&mut self, budget: PollBudget) -> Result<(), Error> {
        self.regs.dsb();
        self.wait_for_not_busy(budget)?;
        self.check_err()
    }

    fn start(&mut self, bits: u32, budget: PollBudget) -> Result<(), Error> {
        self.clear_all_err();
        self.regs.write(Reg::Cr, bits);
        self.regs.modify(Reg::Cr, |w| w | cr::STRT);
        self.complete(budget)
    }

    /// Erases both banks, setting all the bits to `1`.
    ///
    /// On single bank devices `MER2` is ignored by the hardware.
    pub fn mass_erase(&mut self, budget: PollBudget) -> Result<(), Error> {
        trace!("mass erase");
        self.start(cr::MER1 | cr::MER2, budget)
    }

    /// Erases a 2048 byte page, setting all the bits to `1`.
    pub fn page_erase(&mut self, page: Page, budget: PollBudget) -> Result<(), Error> {
        trace!(
            "page erase bank={} page={}",
            page.bank().to_index(),
            page.to_index()
        );
        let bits: u32 = cr::PER
            | ((u32::from(page.to_index()) << cr::PNB_SHIFT) & cr::PNB_MASK)
            | (page.bank().to_index() << cr::BKER_SHIFT);
        self.start(bits, budget)
    }

    /// Program `size` bytes of `data` starting at `addr`, one double-word at
    /// a time.
    ///
    /// `size` is rounded up to a multiple of 8 bytes. Bytes past the end of
    /// `data` are programmed with the erased value `0xFF`, bytes of `data`
    /// past the rounded size are ignored. Programming stops at the first
    /// double-word that fails.
    ///
    /// `budget` applies to each double-word.
    pub fn program(
        &mut self,
        addr: u32,
        size: u32,
        data: &[u8],
        budget: PollBudget,
    ) -> Result<(), Error> {
        let double_words: u32 = size.div_ceil(8);
        self.clear_all_err();
        self.regs.write(Reg::Cr, cr::PG);

        let mut ret: Result<(), Error> = Ok(());
        for n in 0..double_words {
            let offset: usize = (n as usize) * 8;
            let mut dw: [u8; 8] = [0xFF; 8];
            if let Some(rest) = data.get(offset..) {
                let len: usize = rest.len().min(8);
                dw[..len].copy_from_slice(&rest[..len]);
            }

            let to: u32 = addr.wrapping_add(n * 8);
            let lo: u32 = u32::from_le_bytes([dw[0], dw[1], dw[2], dw[3]]);
            let hi: u32 = u32::from_le_bytes([dw[4], dw[5], dw[6], dw[7]]);

            self.regs.write_word(to, lo);
            self.regs.write_word(to.wrapping_add(4), hi);

            ret = self.complete(budget);
            if ret.is_err() {
                debug!("double-word at {:#08X} failed", to);
                break;
            }
        }

        self.regs.modify(Reg::Cr, |w| w & !cr::PG);
        ret
    }

    /// Write `image` to the option registers and program the option bytes.
    ///
    /// The option registers must be unlocked. The new values take effect
    /// after the next option byte load.
    pub fn option_program(&mut self, image: &OptionImage, budget: PollBudget) -> Result<(), Error> {
        self.clear_all_err();
        for (field, value) in image.iter() {
            trace!("option {} = {:#08X}", field.reg, value);
            self.regs.write(field.reg, value);
        }
        self.regs.write(Reg::Cr, cr::OPTSTRT);
        self.complete(budget)
    }
}
