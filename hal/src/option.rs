//! Option bytes
//!
//! The host programs the option bytes as one image of little-endian 32-bit
//! words, one word per option register. Which registers are present depends
//! on the sub-family (G0x0 or G0x1) and on the number of banks.

use crate::regs::Reg;

/// Valid bits of `OPTR`.
pub const OPTR_MASK: u32 = 0x3F7F_FFFF;
/// Valid bits of `WRPxyR`.
pub const WRP_MASK: u32 = 0x007F_007F;
/// Valid bits of `PCROPxASR` and `PCROPxBSR`.
pub const PCROP_START_MASK: u32 = 0x0000_01FF;
/// Valid bits of `PCROPxAER`, including `PCROP_RDP`.
pub const PCROP_A_END_MASK: u32 = 0x8000_01FF;
/// Valid bits of `PCROPxBER`.
pub const PCROP_B_END_MASK: u32 = 0x0000_01FF;
/// Valid bits of `SECR`.
pub const SECR_MASK: u32 = 0x0FF1_00FF;

/// Factory value of `OPTR`: read protection level 0, everything else set.
pub const OPTR_RESET: u32 = 0xFFFF_FEAA;

/// Largest number of option registers in a layout.
pub const MAX_FIELDS: usize = 14;

/// One option register.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OptionField {
    /// Register holding the field.
    pub reg: Reg,
    /// Bits that may be written.
    pub mask: u32,
    /// Value restored by a chip erase.
    pub reset: u32,
}

impl OptionField {
    const fn new(reg: Reg, mask: u32, reset: u32) -> Self {
        Self { reg, mask, reset }
    }
}

const G0X0_SB: [OptionField; 3] = [
    OptionField::new(Reg::Optr, OPTR_MASK, OPTR_RESET),
    OptionField::new(Reg::Wrp1ar, WRP_MASK, 0x7F),
    OptionField::new(Reg::Wrp1br, WRP_MASK, 0x7F),
];

const G0X0_DB: [OptionField; 5] = [
    OptionField::new(Reg::Optr, OPTR_MASK, OPTR_RESET),
    OptionField::new(Reg::Wrp1ar, WRP_MASK, 0x7F),
    OptionField::new(Reg::Wrp1br, WRP_MASK, 0x7F),
    OptionField::new(Reg::Wrp2ar, WRP_MASK, 0x7F),
    OptionField::new(Reg::Wrp2br, WRP_MASK, 0x7F),
];

const G0X1_SB: [OptionField; 8] = [
    OptionField::new(Reg::Optr, OPTR_MASK, OPTR_RESET),
    OptionField::new(Reg::Wrp1ar, WRP_MASK, 0xFF),
    OptionField::new(Reg::Wrp1br, WRP_MASK, 0xFF),
    OptionField::new(Reg::Pcrop1asr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop1aer, PCROP_A_END_MASK, 0),
    OptionField::new(Reg::Pcrop1bsr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop1ber, PCROP_B_END_MASK, 0),
    OptionField::new(Reg::Secr, SECR_MASK, 0),
];

const G0X1_DB: [OptionField; MAX_FIELDS] = [
    OptionField::new(Reg::Optr, OPTR_MASK, OPTR_RESET),
    OptionField::new(Reg::Wrp1ar, WRP_MASK, 0xFF),
    OptionField::new(Reg::Wrp1br, WRP_MASK, 0xFF),
    OptionField::new(Reg::Pcrop1asr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop1aer, PCROP_A_END_MASK, 0),
    OptionField::new(Reg::Pcrop1bsr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop1ber, PCROP_B_END_MASK, 0),
    OptionField::new(Reg::Secr, SECR_MASK, 0),
    OptionField::new(Reg::Wrp2ar, WRP_MASK, 0xFF),
    OptionField::new(Reg::Wrp2br, WRP_MASK, 0xFF),
    OptionField::new(Reg::Pcrop2asr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop2aer, PCROP_A_END_MASK, 0),
    OptionField::new(Reg::Pcrop2bsr, PCROP_START_MASK, 0x1FF),
    OptionField::new(Reg::Pcrop2ber, PCROP_B_END_MASK, 0),
];

/// Sub-family.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubFamily {
    /// STM32G030, STM32G050, STM32G070, STM32G0B0: no PCROP, no securable
    /// memory.
    G0x0,
    /// STM32G031, STM32G041, STM32G051, STM32G061, STM32G071, STM32G081,
    /// STM32G0B1, STM32G0C1.
    G0x1,
}

/// Option register layout.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OptionLayout {
    family: SubFamily,
    dual_bank: bool,
}

impl OptionLayout {
    /// G0x0, single bank.
    pub const G0X0_SB: Self = Self::new(SubFamily::G0x0, false);
    /// G0x0, dual bank.
    pub const G0X0_DB: Self = Self::new(SubFamily::G0x0, true);
    /// G0x1, single bank.
    pub const G0X1_SB: Self = Self::new(SubFamily::G0x1, false);
    /// G0x1, dual bank.
    pub const G0X1_DB: Self = Self::new(SubFamily::G0x1, true);

    /// Create a layout.
    pub const fn new(family: SubFamily, dual_bank: bool) -> Self {
        Self { family, dual_bank }
    }

    /// Sub-family of the layout.
    pub const fn family(&self) -> SubFamily {
        self.family
    }

    /// Returns `true` if the layout includes the bank 2 registers.
    pub const fn is_dual_bank(&self) -> bool {
        self.dual_bank
    }

    /// Option registers, in image order.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::{option::OptionLayout, regs::Reg};
    ///
    /// let fields = OptionLayout::G0X0_DB.fields();
    /// assert_eq!(fields.len(), 5);
    /// assert_eq!(fields[0].reg, Reg::Optr);
    /// assert_eq!(fields[4].reg, Reg::Wrp2br);
    /// ```
    pub const fn fields(&self) -> &'static [OptionField] {
        match (self.family, self.dual_bank) {
            (SubFamily::G0x0, false) => &G0X0_SB,
            (SubFamily::G0x0, true) => &G0X0_DB,
            (SubFamily::G0x1, false) => &G0X1_SB,
            (SubFamily::G0x1, true) => &G0X1_DB,
        }
    }

    /// Size of the image in bytes.
    pub const fn image_len(&self) -> usize {
        self.fields().len() * 4
    }
}

/// Option byte image, one masked word per field of the layout.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OptionImage {
    layout: OptionLayout,
    words: [u32; MAX_FIELDS],
}

impl OptionImage {
    /// Parse an image from the host buffer.
    ///
    /// Each word is masked to the valid bits of its register. Bytes beyond
    /// the layout are ignored.
    ///
    /// Returns `None` if `buf` is shorter than the layout.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32g0xx_flash::option::{OptionImage, OptionLayout};
    ///
    /// let buf: [u8; 12] = [0xFF; 12];
    /// let image = OptionImage::from_bytes(OptionLayout::G0X0_SB, &buf).unwrap();
    /// assert_eq!(image.word(0), Some(0x3F7F_FFFF));
    /// assert_eq!(image.word(1), Some(0x007F_007F));
    /// assert_eq!(image.word(3), None);
    ///
    /// assert!(OptionImage::from_bytes(OptionLayout::G0X0_DB, &buf).is_none());
    /// ```
    pub fn from_bytes(layout: OptionLayout, buf: &[u8]) -> Option<Self> {
        if buf.len() < layout.image_len() {
            return None;
        }

        let mut words: [u32; MAX_FIELDS] = [0; MAX_FIELDS];
        layout
            .fields()
            .iter()
            .zip(buf.chunks_exact(4))
            .zip(words.iter_mut())
            .for_each(|((field, raw), word)| {
                *word = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) & field.mask
            });

        Some(Self { layout, words })
    }

    /// Image of the factory option values.
    pub fn factory(layout: OptionLayout) -> Self {
        let mut words: [u32; MAX_FIELDS] = [0; MAX_FIELDS];
        layout
            .fields()
            .iter()
            .zip(words.iter_mut())
            .for_each(|(field, word)| *word = field.reset);
        Self { layout, words }
    }

    /// Layout of the image.
    pub const fn layout(&self) -> OptionLayout {
        self.layout
    }

    /// Masked word of field `idx`.
    pub fn word(&self, idx: usize) -> Option<u32> {
        if idx < self.layout.fields().len() {
            Some(self.words[idx])
        } else {
            None
        }
    }

    /// Iterate over the fields and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&'static OptionField, u32)> + '_ {
        self.layout
            .fields()
            .iter()
            .zip(self.words.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::optr;

    #[test]
    fn image_sizes() {
        assert_eq!(OptionLayout::G0X0_SB.image_len(), 12);
        assert_eq!(OptionLayout::G0X0_DB.image_len(), 20);
        assert_eq!(OptionLayout::G0X1_SB.image_len(), 32);
        assert_eq!(OptionLayout::G0X1_DB.image_len(), 56);
    }

    #[test]
    fn layouts() {
        assert_eq!(OptionLayout::G0X0_DB.family(), SubFamily::G0x0);
        assert!(OptionLayout::G0X0_DB.is_dual_bank());
        assert_eq!(OptionLayout::G0X1_SB.family(), SubFamily::G0x1);
        assert!(!OptionLayout::G0X1_SB.is_dual_bank());
        assert_eq!(
            OptionImage::factory(OptionLayout::G0X1_SB).layout(),
            OptionLayout::G0X1_SB
        );
    }

    #[test]
    fn g0x1_masks() {
        let buf: [u8; 56] = [0xFF; 56];
        let image = OptionImage::from_bytes(OptionLayout::G0X1_DB, &buf).unwrap();
        let words: [u32; MAX_FIELDS] = core::array::from_fn(|idx| image.word(idx).unwrap());
        assert_eq!(
            words,
            [
                0x3F7F_FFFF,
                0x007F_007F,
                0x007F_007F,
                0x0000_01FF,
                0x8000_01FF,
                0x0000_01FF,
                0x0000_01FF,
                0x0FF1_00FF,
                0x007F_007F,
                0x007F_007F,
                0x0000_01FF,
                0x8000_01FF,
                0x0000_01FF,
                0x0000_01FF,
            ]
        );
    }

    #[test]
    fn little_endian_words() {
        let mut buf: [u8; 12] = [0; 12];
        buf[..4].copy_from_slice(&[0xAA, 0xF8, 0xFF, 0xDF]);
        buf[4..8].copy_from_slice(&[0x10, 0x00, 0x20, 0x00]);
        let image = OptionImage::from_bytes(OptionLayout::G0X0_SB, &buf).unwrap();
        assert_eq!(image.word(0), Some(0xDFFF_F8AA & OPTR_MASK));
        assert_eq!(image.word(1), Some(0x0020_0010));
        assert_eq!(image.word(2), Some(0));
    }

    #[test]
    fn factory_values() {
        assert_eq!(OPTR_RESET & optr::RDP_MASK, optr::RDP_LEVEL0);

        let g0x0 = OptionImage::factory(OptionLayout::G0X0_DB);
        assert_eq!(g0x0.word(0), Some(OPTR_RESET));
        assert!((1..5).all(|idx| g0x0.word(idx) == Some(0x7F)));

        let g0x1 = OptionImage::factory(OptionLayout::G0X1_SB);
        let regs: [(Reg, u32); 8] = core::array::from_fn(|idx| {
            let (field, value) = g0x1.iter().nth(idx).unwrap();
            (field.reg, value)
        });
        assert_eq!(
            regs,
            [
                (Reg::Optr, 0xFFFF_FEAA),
                (Reg::Wrp1ar, 0xFF),
                (Reg::Wrp1br, 0xFF),
                (Reg::Pcrop1asr, 0x1FF),
                (Reg::Pcrop1aer, 0),
                (Reg::Pcrop1bsr, 0x1FF),
                (Reg::Pcrop1ber, 0),
                (Reg::Secr, 0),
            ]
        );
    }
}
