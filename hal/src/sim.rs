//! Simulated flash controller
//!
//! A register level model of the G0 flash controller for host testing:
//!
//! * `KEYR` / `OPTKEYR` key sequences clear `LOCK` / `OPTLOCK`
//! * `SR` error flags are write-1-to-clear, `BSY1` reads set for a
//!   configurable number of polls after each command
//! * mass erase, page erase with `BKER`/`PNB` decoding, double-word
//!   programming with `PGSERR`, `PGAERR` and `PROGERR` detection
//! * option register writes, `OPTSTRT` and `OBL_LAUNCH`
//! * error injection and a stuck busy flag
//!
//! Only [`SIM_PAGES`] pages of main flash are backed by storage at a time,
//! reads of other pages return the erased value.

use crate::{
    device::{FLASH_START, OTP_START},
    geometry::Page,
    info::DeviceId,
    regs::{self, Reg, RegisterFile, acr, cr, optr, sr},
};

/// Number of main flash pages backed by storage.
pub const SIM_PAGES: usize = 32;
/// Number of events kept in the log.
pub const LOG_LEN: usize = 256;

const OTP_SIZE: usize = 0x400;
const FLASH_REGS: usize = (0x80 / 4) + 1;
const PAGE_BYTES: usize = Page::SIZE as usize;

/// Recorded side effect.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Register write.
    Write(Reg, u32),
    /// Memory write, address and value.
    Program(u32, u32),
    /// Data synchronization barrier.
    Barrier,
    /// Interrupts masked.
    DisableInterrupts,
}

#[derive(Debug, Clone, Copy)]
struct SimPage {
    addr: u32,
    data: [u8; PAGE_BYTES],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Idle,
    FirstKey,
}

/// Simulated register file.
#[derive(Debug, Clone)]
pub struct SimFlash {
    flash: [u32; FLASH_REGS],
    iwdg: [u32; 3],
    wwdg: [u32; 2],
    idcode: u32,
    size_kib: u16,

    pages: [Option<SimPage>; SIM_PAGES],
    otp: [u8; OTP_SIZE],
    pending: Option<(u32, u32)>,

    key: KeyState,
    opt_key: KeyState,
    key_fault: bool,

    busy_polls: u32,
    busy_left: u32,
    stuck_busy: bool,
    inject: Option<(u32, u32)>,

    commands: u32,
    double_words: u32,
    option_programs: u32,
    option_loads: u32,
    dropped_writes: u32,
    interrupts_disabled: bool,

    log: [Option<Event>; LOG_LEN],
    log_len: usize,
}

impl SimFlash {
    /// Create a locked controller, as after reset.
    ///
    /// `dev_id` is the `DEV_ID` field of `DBGMCU_IDCODE`, `size_kib` the
    /// flash size data register and `optr` the loaded option register.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::{regs::{Reg, RegisterFile}, sim::SimFlash};
    ///
    /// let mut sim = SimFlash::new(0x460, 64, 0xFFFF_FEAA);
    /// assert!(sim.is_locked());
    /// assert_eq!(sim.read(Reg::FlashSize), 64);
    /// ```
    pub fn new(dev_id: u16, size_kib: u16, optr: u32) -> Self {
        let mut flash: [u32; FLASH_REGS] = [0; FLASH_REGS];
        flash[idx(Reg::Acr)] = 0x0000_0600 | acr::EMPTY;
        flash[idx(Reg::Cr)] = cr::LOCK | cr::OPTLOCK;
        flash[idx(Reg::Optr)] = optr;

        Self {
            flash,
            iwdg: [0; 3],
            wwdg: [0x7F, 0x7F],
            idcode: u32::from(dev_id) & 0xFFF,
            size_kib,
            pages: [None; SIM_PAGES],
            otp: [0xFF; OTP_SIZE],
            pending: None,
            key: KeyState::Idle,
            opt_key: KeyState::Idle,
            key_fault: false,
            busy_polls: 0,
            busy_left: 0,
            stuck_busy: false,
            inject: None,
            commands: 0,
            double_words: 0,
            option_programs: 0,
            option_loads: 0,
            dropped_writes: 0,
            interrupts_disabled: false,
            log: [None; LOG_LEN],
            log_len: 0,
        }
    }

    /// Keep `BSY1` set for `polls` status reads after each command.
    #[must_use = "with_busy_polls returns a modified SimFlash"]
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Keep the busy flags and `OBL_LAUNCH` set forever.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Make the `nth` command from now (0 for the next one) set `bits` in
    /// `SR` instead of completing.
    ///
    /// Commands are mass erase, page erase, one double-word program and
    /// option program.
    pub fn fail_command(&mut self, nth: u32, bits: u32) {
        self.inject = Some((self.commands + nth, bits));
    }

    /// Set status register bits directly, as left behind by an earlier
    /// operation.
    pub fn set_sr(&mut self, bits: u32) {
        self.flash[idx(Reg::Sr)] |= bits & 0xFFFF;
    }

    /// Read a register without side effects.
    pub fn peek(&self, reg: Reg) -> u32 {
        match reg {
            Reg::IwdgKr => self.iwdg[0],
            Reg::IwdgPr => self.iwdg[1],
            Reg::IwdgRlr => self.iwdg[2],
            Reg::WwdgCr => self.wwdg[0],
            Reg::WwdgCfr => self.wwdg[1],
            Reg::DbgmcuIdcode => self.idcode,
            Reg::FlashSize => u32::from(self.size_kib),
            _ => self.flash[idx(reg)],
        }
    }

    /// Read a byte of main flash or OTP.
    pub fn byte(&self, addr: u32) -> u8 {
        if let Some(off) = self.otp_offset(addr) {
            self.otp[off]
        } else {
            let base: u32 = addr & !(Page::SIZE - 1);
            self.page(base)
                .map(|page| page.data[(addr - base) as usize])
                .unwrap_or(0xFF)
        }
    }

    /// Store bytes in main flash or OTP without going through the
    /// controller.
    pub fn preload(&mut self, addr: u32, data: &[u8]) {
        for (n, &byte) in data.iter().enumerate() {
            let addr: u32 = addr + n as u32;
            if let Some(off) = self.otp_offset(addr) {
                self.otp[off] = byte;
            } else if self.in_main(addr) {
                let base: u32 = addr & !(Page::SIZE - 1);
                match self.page_mut(base) {
                    Some(page) => page.data[(addr - base) as usize] = byte,
                    None => self.dropped_writes += 1,
                }
            }
        }
    }

    /// Returns `true` if `CR.LOCK` is set.
    pub fn is_locked(&self) -> bool {
        self.peek(Reg::Cr) & cr::LOCK != 0
    }

    /// Returns `true` if `CR.OPTLOCK` is set.
    pub fn is_options_locked(&self) -> bool {
        self.peek(Reg::Cr) & cr::OPTLOCK != 0
    }

    /// Returns `true` if a wrong key sequence was written.
    pub fn key_fault(&self) -> bool {
        self.key_fault
    }

    /// Number of commands started.
    pub fn commands(&self) -> u32 {
        self.commands
    }

    /// Number of double-words that reached the programming stage.
    pub fn double_words(&self) -> u32 {
        self.double_words
    }

    /// Number of `OPTSTRT` commands.
    pub fn option_programs(&self) -> u32 {
        self.option_programs
    }

    /// Number of completed option byte loads.
    pub fn option_loads(&self) -> u32 {
        self.option_loads
    }

    /// Number of memory writes lost because no page storage was free.
    pub fn dropped_writes(&self) -> u32 {
        self.dropped_writes
    }

    /// Returns `true` if interrupts were masked.
    pub fn interrupts_disabled(&self) -> bool {
        self.interrupts_disabled
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.log[..self.log_len].iter().flatten().copied()
    }

    /// Recorded register writes to `reg`, oldest first.
    pub fn writes(&self, reg: Reg) -> impl Iterator<Item = u32> + '_ {
        self.events().filter_map(move |event| match event {
            Event::Write(r, value) if r == reg => Some(value),
            _ => None,
        })
    }

    /// Forget recorded events.
    pub fn clear_events(&mut self) {
        self.log = [None; LOG_LEN];
        self.log_len = 0;
    }

    fn record(&mut self, event: Event) {
        if let Some(slot) = self.log.get_mut(self.log_len) {
            *slot = Some(event);
            self.log_len += 1;
        }
    }

    fn size(&self) -> u32 {
        u32::from(self.size_kib) << 10
    }

    fn dual_bank_device(&self) -> bool {
        !matches!(
            DeviceId::try_from(self.idcode as u16),
            Ok(id) if id.is_single_bank()
        )
    }

    fn per_bank_pages(&self) -> bool {
        self.dual_bank_device()
            && (self.flash[idx(Reg::Optr)] & optr::DUAL_BANK != 0 || self.size() == 0x8_0000)
    }

    fn in_main(&self, addr: u32) -> bool {
        addr >= FLASH_START && addr - FLASH_START < self.size()
    }

    fn otp_offset(&self, addr: u32) -> Option<usize> {
        match addr.checked_sub(OTP_START) {
            Some(off) if (off as usize) < OTP_SIZE => Some(off as usize),
            _ => None,
        }
    }

    fn page(&self, base: u32) -> Option<&SimPage> {
        self.pages.iter().flatten().find(|page| page.addr == base)
    }

    fn page_mut(&mut self, base: u32) -> Option<&mut SimPage> {
        let pos: Option<usize> = self
            .pages
            .iter()
            .position(|page| matches!(page, Some(page) if page.addr == base))
            .or_else(|| self.pages.iter().position(Option::is_none));
        match pos {
            Some(pos) => Some(self.pages[pos].get_or_insert(SimPage {
                addr: base,
                data: [0xFF; PAGE_BYTES],
            })),
            None => None,
        }
    }

    fn erase_range(&mut self, start: u32, end: u32) {
        self.pages
            .iter_mut()
            .filter(|page| matches!(page, Some(page) if page.addr >= start && page.addr < end))
            .for_each(|page| *page = None);
    }

    fn locked(&self) -> bool {
        self.flash[idx(Reg::Cr)] & cr::LOCK != 0
    }

    fn options_locked(&self) -> bool {
        self.locked() || self.flash[idx(Reg::Cr)] & cr::OPTLOCK != 0
    }

    fn set_err(&mut self, bits: u32) {
        self.flash[idx(Reg::Sr)] |= bits;
    }

    // returns true if the command may proceed
    fn begin_command(&mut self) -> bool {
        let nth: u32 = self.commands;
        self.commands += 1;
        self.busy_left = self.busy_polls;
        match self.inject {
            Some((at, bits)) if at == nth => {
                self.inject = None;
                self.set_err(bits);
                false
            }
            _ => true,
        }
    }

    fn write_cr(&mut self, value: u32) {
        let old: u32 = self.flash[idx(Reg::Cr)];

        // OBL_LAUNCH is only write protected by OPTLOCK
        if value & cr::OBL_LAUNCH != 0 && old & cr::OPTLOCK == 0 {
            self.launch_option_load(old);
            return;
        }
        if old & cr::LOCK != 0 {
            return;
        }

        // OPTLOCK can only be cleared with the keys
        let new: u32 = (value & !cr::OBL_LAUNCH) | (old & cr::OPTLOCK);
        self.flash[idx(Reg::Cr)] = new & !(cr::STRT | cr::OPTSTRT);

        if new & cr::STRT != 0 {
            if new & (cr::MER1 | cr::MER2) != 0 {
                self.mass_erase(new);
            } else if new & cr::PER != 0 {
                self.page_erase(new);
            } else {
                self.set_err(sr::PGSERR);
            }
        } else if new & cr::OPTSTRT != 0 {
            if self.options_locked() {
                self.set_err(sr::PGSERR);
            } else if self.begin_command() {
                self.option_programs += 1;
            }
        }
    }

    fn launch_option_load(&mut self, old: u32) {
        if self.stuck_busy {
            self.flash[idx(Reg::Cr)] = old | cr::OBL_LAUNCH;
        } else {
            self.option_loads += 1;
            self.flash[idx(Reg::Cr)] = cr::LOCK | cr::OPTLOCK;
            self.key = KeyState::Idle;
            self.opt_key = KeyState::Idle;
        }
    }

    fn mass_erase(&mut self, bits: u32) {
        if !self.begin_command() {
            return;
        }
        let size: u32 = self.size();
        let half: u32 = FLASH_START + size / 2;
        let end: u32 = FLASH_START + size;
        if !self.dual_bank_device() {
            if bits & cr::MER1 != 0 {
                self.erase_range(FLASH_START, end);
            }
            return;
        }
        if bits & cr::MER1 != 0 {
            self.erase_range(FLASH_START, half);
        }
        if bits & cr::MER2 != 0 {
            self.erase_range(half, end);
        }
    }

    fn page_erase(&mut self, bits: u32) {
        if !self.begin_command() {
            return;
        }
        let pnb: u32 = (bits & cr::PNB_MASK) >> cr::PNB_SHIFT;
        let bker: u32 = (bits & cr::BKER) >> cr::BKER_SHIFT;
        let bank_offset: u32 = if self.per_bank_pages() {
            bker * (self.size() / 2)
        } else {
            0
        };
        let addr: u32 = FLASH_START + bank_offset + pnb * Page::SIZE;
        if !self.in_main(addr) {
            self.set_err(sr::OPERR);
            return;
        }
        self.erase_range(addr, addr + Page::SIZE);
    }

    fn program_word(&mut self, addr: u32, value: u32) {
        let cr_bits: u32 = self.flash[idx(Reg::Cr)];
        if cr_bits & cr::LOCK != 0 || cr_bits & cr::PG == 0 {
            self.set_err(sr::PGSERR);
            self.pending = None;
            return;
        }

        let (lo_addr, lo) = match self.pending.take() {
            None => {
                if addr % 8 != 0 {
                    self.set_err(sr::PGAERR);
                } else {
                    self.pending = Some((addr, value));
                }
                return;
            }
            Some(pending) => pending,
        };

        if addr != lo_addr + 4 {
            self.set_err(sr::PGAERR);
            return;
        }
        if !self.begin_command() {
            return;
        }
        self.double_words += 1;

        let current: [u8; 8] = core::array::from_fn(|n| self.byte(lo_addr + n as u32));
        let erased: bool = current.iter().all(|&b| b == 0xFF);
        if !erased && (lo | value) != 0 {
            self.set_err(sr::PROGERR);
            return;
        }

        let mut bytes: [u8; 8] = [0; 8];
        bytes[..4].copy_from_slice(&lo.to_le_bytes());
        bytes[4..].copy_from_slice(&value.to_le_bytes());
        self.preload(lo_addr, &bytes);
    }
}

fn idx(reg: Reg) -> usize {
    (reg.offset() / 4) as usize
}

const fn is_option_reg(reg: Reg) -> bool {
    matches!(
        reg,
        Reg::Optr
            | Reg::Pcrop1asr
            | Reg::Pcrop1aer
            | Reg::Wrp1ar
            | Reg::Wrp1br
            | Reg::Pcrop1bsr
            | Reg::Pcrop1ber
            | Reg::Pcrop2asr
            | Reg::Pcrop2aer
            | Reg::Wrp2ar
            | Reg::Wrp2br
            | Reg::Pcrop2bsr
            | Reg::Pcrop2ber
            | Reg::Secr
    )
}

impl RegisterFile for SimFlash {
    fn read(&mut self, reg: Reg) -> u32 {
        match reg {
            Reg::Sr => {
                let mut value: u32 = self.flash[idx(Reg::Sr)];
                if self.stuck_busy {
                    value |= sr::BSY1;
                } else if self.busy_left > 0 {
                    self.busy_left -= 1;
                    value |= sr::BSY1;
                }
                value
            }
            _ => self.peek(reg),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.record(Event::Write(reg, value));
        match reg {
            Reg::Keyr => match (self.key, value) {
                (KeyState::Idle, regs::KEY1) => self.key = KeyState::FirstKey,
                (KeyState::FirstKey, regs::KEY2) => {
                    self.key = KeyState::Idle;
                    self.flash[idx(Reg::Cr)] &= !cr::LOCK;
                }
                _ => {
                    self.key = KeyState::Idle;
                    self.key_fault = true;
                }
            },
            Reg::Optkeyr => match (self.opt_key, value) {
                (KeyState::Idle, regs::OPTKEY1) if !self.locked() => {
                    self.opt_key = KeyState::FirstKey
                }
                (KeyState::FirstKey, regs::OPTKEY2) => {
                    self.opt_key = KeyState::Idle;
                    self.flash[idx(Reg::Cr)] &= !cr::OPTLOCK;
                }
                _ => {
                    self.opt_key = KeyState::Idle;
                    self.key_fault = true;
                }
            },
            Reg::Sr => self.flash[idx(Reg::Sr)] &= !(value & 0xFFFF),
            Reg::Cr => self.write_cr(value),
            Reg::IwdgKr => self.iwdg[0] = value,
            Reg::IwdgPr => self.iwdg[1] = value,
            Reg::IwdgRlr => self.iwdg[2] = value,
            Reg::WwdgCr => self.wwdg[0] = value,
            Reg::WwdgCfr => self.wwdg[1] = value,
            Reg::DbgmcuIdcode | Reg::FlashSize => (),
            reg if is_option_reg(reg) => {
                if !self.options_locked() {
                    self.flash[idx(reg)] = value;
                }
            }
            reg => self.flash[idx(reg)] = value,
        }
    }

    fn read_word(&mut self, addr: u32) -> u32 {
        u32::from_le_bytes(core::array::from_fn(|n| self.byte(addr + n as u32)))
    }

    fn write_word(&mut self, addr: u32, value: u32) {
        self.record(Event::Program(addr, value));
        if self.in_main(addr) || self.otp_offset(addr).is_some() {
            self.program_word(addr, value);
        }
    }

    fn dsb(&mut self) {
        self.record(Event::Barrier);
    }

    fn disable_interrupts(&mut self) {
        self.record(Event::DisableInterrupts);
        self.interrupts_disabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked() -> SimFlash {
        let mut sim = SimFlash::new(0x467, 512, 0xFFFF_FEAA);
        sim.write(Reg::Keyr, regs::KEY1);
        sim.write(Reg::Keyr, regs::KEY2);
        sim
    }

    #[test]
    fn keys() {
        let sim = unlocked();
        assert!(!sim.is_locked());
        assert!(sim.is_options_locked());
        assert!(!sim.key_fault());
    }

    #[test]
    fn wrong_key_order() {
        let mut sim = SimFlash::new(0x467, 512, 0xFFFF_FEAA);
        sim.write(Reg::Keyr, regs::KEY2);
        sim.write(Reg::Keyr, regs::KEY1);
        assert!(sim.is_locked());
        assert!(sim.key_fault());
    }

    #[test]
    fn option_keys_need_unlocked_flash() {
        let mut sim = SimFlash::new(0x467, 512, 0xFFFF_FEAA);
        sim.write(Reg::Optkeyr, regs::OPTKEY1);
        sim.write(Reg::Optkeyr, regs::OPTKEY2);
        assert!(sim.is_options_locked());
    }

    #[test]
    fn write_one_to_clear() {
        let mut sim = unlocked();
        sim.set_sr(sr::WRPERR | sr::PGSERR);
        sim.write(Reg::Sr, sr::WRPERR);
        assert_eq!(sim.read(Reg::Sr), sr::PGSERR);
    }

    #[test]
    fn busy_polls() {
        let mut sim = unlocked().with_busy_polls(2);
        sim.write(Reg::Cr, cr::PER);
        sim.write(Reg::Cr, cr::PER | cr::STRT);
        assert_eq!(sim.read(Reg::Sr) & sr::BSY, sr::BSY1);
        assert_eq!(sim.read(Reg::Sr) & sr::BSY, sr::BSY1);
        assert_eq!(sim.read(Reg::Sr) & sr::BSY, 0);
        assert_eq!(sim.peek(Reg::Cr) & cr::STRT, 0);
    }

    #[test]
    fn program_without_pg() {
        let mut sim = unlocked();
        sim.write_word(0x0800_0000, 0);
        assert_eq!(sim.peek(Reg::Sr), sr::PGSERR);
        assert_eq!(sim.double_words(), 0);
    }

    #[test]
    fn program_unaligned() {
        let mut sim = unlocked();
        sim.write(Reg::Cr, cr::PG);
        sim.write_word(0x0800_0004, 0);
        assert_eq!(sim.peek(Reg::Sr), sr::PGAERR);
    }

    #[test]
    fn program_twice() {
        let mut sim = unlocked();
        sim.write(Reg::Cr, cr::PG);
        sim.write_word(0x0800_0000, 0x1234_5678);
        sim.write_word(0x0800_0004, 0x9ABC_DEF0);
        assert_eq!(sim.peek(Reg::Sr), 0);
        assert_eq!(sim.read_word(0x0800_0004), 0x9ABC_DEF0);

        sim.write_word(0x0800_0000, 1);
        sim.write_word(0x0800_0004, 1);
        assert_eq!(sim.peek(Reg::Sr), sr::PROGERR);
        assert_eq!(sim.read_word(0x0800_0000), 0x1234_5678);

        // zeros may always be written
        sim.write(Reg::Sr, sr::ERRORS);
        sim.write_word(0x0800_0000, 0);
        sim.write_word(0x0800_0004, 0);
        assert_eq!(sim.peek(Reg::Sr), 0);
        assert_eq!(sim.read_word(0x0800_0000), 0);
    }

    #[test]
    fn page_erase_bank2() {
        let mut sim = unlocked();
        sim.preload(0x0804_0800, &[0; 8]);
        sim.preload(0x0800_0800, &[0; 8]);
        sim.write(Reg::Cr, cr::PER | (1 << cr::PNB_SHIFT) | cr::BKER);
        sim.write(Reg::Cr, cr::PER | (1 << cr::PNB_SHIFT) | cr::BKER | cr::STRT);
        assert_eq!(sim.read_word(0x0804_0800), 0xFFFF_FFFF);
        assert_eq!(sim.read_word(0x0800_0800), 0);
    }

    #[test]
    fn obl_launch_relocks() {
        let mut sim = unlocked();
        sim.write(Reg::Optkeyr, regs::OPTKEY1);
        sim.write(Reg::Optkeyr, regs::OPTKEY2);
        assert!(!sim.is_options_locked());
        sim.write(Reg::Cr, cr::OBL_LAUNCH);
        assert_eq!(sim.option_loads(), 1);
        assert!(sim.is_locked());
        assert!(sim.is_options_locked());
    }
}
