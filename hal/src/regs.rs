//! Register access
//!
//! Every register the algorithm touches is named by [`Reg`] and reached
//! through a [`RegisterFile`]. On the target that is [`Mmio`]; on the host
//! the drivers run against [`crate::sim::SimFlash`].

use core::ptr::{read_volatile, write_volatile};

/// Flash controller base address.
pub const FLASH_BASE: u32 = 0x4002_2000;
/// Independent watchdog base address.
pub const IWDG_BASE: u32 = 0x4000_3000;
/// Window watchdog base address.
pub const WWDG_BASE: u32 = 0x4000_2C00;
/// Debug MCU base address, `IDCODE` is at offset 0.
pub const DBGMCU_BASE: u32 = 0x4001_5800;
/// Flash size data register, in kibibytes (low 16 bits).
pub const FLASHSIZE_BASE: u32 = 0x1FFF_75E0;

/// First main flash key, written to `KEYR`.
pub const KEY1: u32 = 0x4567_0123;
/// Second main flash key.
pub const KEY2: u32 = 0xCDEF_89AB;
/// First option byte key, written to `OPTKEYR`.
pub const OPTKEY1: u32 = 0x0819_2A3B;
/// Second option byte key.
pub const OPTKEY2: u32 = 0x4C5D_6E7F;

/// Access control register (`ACR`) bits.
pub mod acr {
    /// Main flash empty hint, sampled at boot to pick the boot source.
    pub const EMPTY: u32 = 1 << 16;
}

/// Control register (`CR`) bits.
pub mod cr {
    pub const PG: u32 = 1;
    pub const PER: u32 = 1 << 1;
    pub const MER1: u32 = 1 << 2;
    pub const PNB_SHIFT: u32 = 3;
    pub const PNB_MASK: u32 = 0x3FF << PNB_SHIFT;
    pub const BKER_SHIFT: u32 = 13;
    pub const BKER: u32 = 1 << BKER_SHIFT;
    pub const MER2: u32 = 1 << 15;
    pub const STRT: u32 = 1 << 16;
    pub const OPTSTRT: u32 = 1 << 17;
    pub const OBL_LAUNCH: u32 = 1 << 27;
    pub const OPTLOCK: u32 = 1 << 30;
    pub const LOCK: u32 = 1 << 31;
}

/// Status register (`SR`) bits.
pub mod sr {
    pub const EOP: u32 = 1;
    pub const OPERR: u32 = 1 << 1;
    pub const PROGERR: u32 = 1 << 3;
    pub const WRPERR: u32 = 1 << 4;
    pub const PGAERR: u32 = 1 << 5;
    pub const SIZERR: u32 = 1 << 6;
    pub const PGSERR: u32 = 1 << 7;
    pub const MISSERR: u32 = 1 << 8;
    pub const FASTERR: u32 = 1 << 9;
    pub const RDERR: u32 = 1 << 14;
    pub const OPTVERR: u32 = 1 << 15;
    pub const BSY1: u32 = 1 << 16;
    pub const BSY2: u32 = 1 << 17;

    /// Either bank busy.
    pub const BSY: u32 = BSY1 | BSY2;

    /// Every error flag, cleared before and after each command.
    pub const ERRORS: u32 = OPERR
        | PROGERR
        | WRPERR
        | PGAERR
        | SIZERR
        | PGSERR
        | MISSERR
        | FASTERR
        | RDERR
        | OPTVERR;
}

/// Option register (`OPTR`) bits.
pub mod optr {
    /// Read protection level.
    pub const RDP_MASK: u32 = 0xFF;
    /// Read protection level 0.
    pub const RDP_LEVEL0: u32 = 0xAA;
    /// Independent watchdog started by software (0: started by hardware).
    pub const IWDG_SW: u32 = 1 << 16;
    /// Window watchdog started by software (0: started by hardware).
    pub const WWDG_SW: u32 = 1 << 19;
    pub const DUAL_BANK: u32 = 1 << 21;
}

/// Registers used by the flash algorithm.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    Acr,
    Keyr,
    Optkeyr,
    Sr,
    Cr,
    Optr,
    Pcrop1asr,
    Pcrop1aer,
    Wrp1ar,
    Wrp1br,
    Pcrop1bsr,
    Pcrop1ber,
    Pcrop2asr,
    Pcrop2aer,
    Wrp2ar,
    Wrp2br,
    Pcrop2bsr,
    Pcrop2ber,
    Secr,
    IwdgKr,
    IwdgPr,
    IwdgRlr,
    WwdgCr,
    WwdgCfr,
    DbgmcuIdcode,
    FlashSize,
}

impl Reg {
    /// Offset of the register from its peripheral base.
    pub const fn offset(self) -> u32 {
        match self {
            Reg::Acr => 0x00,
            Reg::Keyr => 0x08,
            Reg::Optkeyr => 0x0C,
            Reg::Sr => 0x10,
            Reg::Cr => 0x14,
            Reg::Optr => 0x20,
            Reg::Pcrop1asr => 0x24,
            Reg::Pcrop1aer => 0x28,
            Reg::Wrp1ar => 0x2C,
            Reg::Wrp1br => 0x30,
            Reg::Pcrop1bsr => 0x34,
            Reg::Pcrop1ber => 0x38,
            Reg::Pcrop2asr => 0x44,
            Reg::Pcrop2aer => 0x48,
            Reg::Wrp2ar => 0x4C,
            Reg::Wrp2br => 0x50,
            Reg::Pcrop2bsr => 0x54,
            Reg::Pcrop2ber => 0x58,
            Reg::Secr => 0x80,
            Reg::IwdgKr => 0x00,
            Reg::IwdgPr => 0x04,
            Reg::IwdgRlr => 0x08,
            Reg::WwdgCr => 0x00,
            Reg::WwdgCfr => 0x04,
            Reg::DbgmcuIdcode => 0x00,
            Reg::FlashSize => 0x00,
        }
    }

    /// Base address of the peripheral that owns the register.
    pub const fn base(self) -> u32 {
        match self {
            Reg::IwdgKr | Reg::IwdgPr | Reg::IwdgRlr => IWDG_BASE,
            Reg::WwdgCr | Reg::WwdgCfr => WWDG_BASE,
            Reg::DbgmcuIdcode => DBGMCU_BASE,
            Reg::FlashSize => FLASHSIZE_BASE,
            _ => FLASH_BASE,
        }
    }

    /// Absolute address of the register.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::regs::Reg;
    ///
    /// assert_eq!(Reg::Sr.addr(), 0x4002_2010);
    /// assert_eq!(Reg::Secr.addr(), 0x4002_2080);
    /// assert_eq!(Reg::IwdgRlr.addr(), 0x4000_3008);
    /// ```
    pub const fn addr(self) -> u32 {
        self.base() + self.offset()
    }
}

/// Access to the registers and the memory array.
///
/// The driver owns its register file exclusively, the host tool guarantees
/// one entry point runs at a time.
pub trait RegisterFile {
    /// Read a register.
    fn read(&mut self, reg: Reg) -> u32;

    /// Write a register.
    fn write(&mut self, reg: Reg, value: u32);

    /// Read-modify-write a register.
    fn modify<F: FnOnce(u32) -> u32>(&mut self, reg: Reg, f: F) {
        let value: u32 = self.read(reg);
        self.write(reg, f(value))
    }

    /// Read a 32-bit word of flash, OTP or option memory.
    fn read_word(&mut self, addr: u32) -> u32;

    /// Write a 32-bit word to flash or OTP memory (a programming access).
    fn write_word(&mut self, addr: u32, value: u32);

    /// Data synchronization barrier.
    fn dsb(&mut self);

    /// Spin loop hint while polling.
    fn nop(&mut self) {}

    /// Mask all maskable interrupts.
    fn disable_interrupts(&mut self);
}

/// Memory mapped registers of the running device.
#[derive(Debug)]
pub struct Mmio {
    _priv: (),
}

impl Mmio {
    /// Steal the flash controller registers.
    ///
    /// # Safety
    ///
    /// 1. Must run on an STM32G0.
    /// 2. Nothing else may access the flash controller, IWDG or WWDG while
    ///    this is in use.
    pub const unsafe fn steal() -> Self {
        Self { _priv: () }
    }
}

impl RegisterFile for Mmio {
    #[inline]
    fn read(&mut self, reg: Reg) -> u32 {
        unsafe { read_volatile(reg.addr() as usize as *const u32) }
    }

    #[inline]
    fn write(&mut self, reg: Reg, value: u32) {
        unsafe { write_volatile(reg.addr() as usize as *mut u32, value) }
    }

    #[inline]
    fn read_word(&mut self, addr: u32) -> u32 {
        unsafe { read_volatile(addr as usize as *const u32) }
    }

    #[inline]
    fn write_word(&mut self, addr: u32, value: u32) {
        unsafe { write_volatile(addr as usize as *mut u32, value) }
    }

    #[inline]
    fn dsb(&mut self) {
        cortex_m::asm::dsb()
    }

    #[inline]
    fn nop(&mut self) {
        cortex_m::asm::nop()
    }

    #[inline]
    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable()
    }
}
