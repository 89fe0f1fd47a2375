use static_assertions::const_assert_eq;
use stm32g0xx_flash::{
    algo::{Algorithm, Function},
    device::{self, CATALOG, Profile, Region},
    geometry::{Bank, BankMode, FlashType, Geometry, Page},
    option::{OPTR_RESET, OptionLayout},
    regs::{Reg, optr},
    sim::SimFlash,
};

const_assert_eq!(Reg::Cr.addr(), 0x4002_2014);
const_assert_eq!(Reg::Optr.addr(), 0x4002_2020);
const_assert_eq!(Reg::Secr.addr(), 0x4002_2080);
const_assert_eq!(Reg::IwdgRlr.addr(), 0x4000_3008);
const_assert_eq!(Reg::WwdgCfr.addr(), 0x4000_2C04);
const_assert_eq!(OptionLayout::G0X0_SB.image_len(), 12);
const_assert_eq!(OptionLayout::G0X1_DB.image_len(), 56);

const SIZES: [u32; 6] = [0x4000, 0x8000, 0x1_0000, 0x2_0000, 0x4_0000, 0x8_0000];

fn geometries() -> impl Iterator<Item = Geometry> {
    SIZES.into_iter().flat_map(|size| {
        [
            Geometry::new(0x0800_0000, size, FlashType::SingleBank, BankMode::Single),
            Geometry::new(0x0800_0000, size, FlashType::DualBank, BankMode::Single),
            Geometry::new(0x0800_0000, size, FlashType::DualBank, BankMode::Dual),
        ]
    })
}

#[test]
fn banks_cover_flash() {
    for geo in geometries() {
        if geo.dual_bank_addressing() {
            assert_eq!(geo.bank_size() * geo.bank_count(), geo.size(), "{geo:?}");
        }
        assert_eq!(
            geo.pages_per_bank() * geo.bank_count(),
            geo.num_pages(),
            "{geo:?}"
        );
    }
}

#[test]
fn every_page_in_range() {
    for geo in geometries() {
        let mut last: Option<Page> = None;
        for addr in (geo.base()..geo.base() + geo.size()).step_by(Page::SIZE as usize / 2) {
            let page: Page = geo.page(addr);
            assert!(
                u32::from(page.to_index()) < geo.pages_per_bank(),
                "{geo:?} {addr:#X}"
            );
            if let Some(last) = last {
                assert!(page >= last, "{geo:?} {addr:#X}");
            }
            last = Some(page);
        }
        let end: Page = geo.page(geo.base() + geo.size() - 1);
        assert_eq!(
            u32::from(end.to_index()),
            geo.pages_per_bank() - 1,
            "{geo:?}"
        );
        let expected: Bank = if geo.dual_bank_addressing() {
            Bank::Bank2
        } else {
            Bank::Bank1
        };
        assert_eq!(end.bank(), expected, "{geo:?}");
    }
}

#[test]
fn quirk_512k() {
    let geo = Geometry::new(0x0800_0000, 0x8_0000, FlashType::DualBank, BankMode::Single);
    assert!(geo.dual_bank_addressing());
    assert_eq!(geo.bank_count(), 2);

    let page: Page = geo.page(0x0801_0000);
    assert_eq!((page.bank(), page.to_index()), (Bank::Bank1, 32));
    let page: Page = geo.page(0x0805_0000);
    assert_eq!((page.bank(), page.to_index()), (Bank::Bank2, 32));

    let geo = Geometry::new(0x0800_0000, 0x8_0000, FlashType::SingleBank, BankMode::Single);
    assert!(!geo.dual_bank_addressing());
}

#[test]
fn catalog() {
    for profile in CATALOG.iter() {
        assert_eq!(Profile::by_name(profile.device.name), Some(profile));
        assert_eq!(profile.device.empty, 0xFF);
        assert!(profile.contains(profile.device.start));
        assert!(!profile.contains(profile.end()));
        match profile.region {
            Region::Main => {
                assert_eq!(profile.device.start, device::FLASH_START);
                assert_eq!(profile.device.sector_size, Page::SIZE);
                assert_eq!(profile.device.size % Page::SIZE, 0);
            }
            Region::Otp => assert_eq!(profile.device.start, device::OTP_START),
            Region::Options(layout) => {
                assert_eq!(profile.device.start, device::OPTION_START);
                assert_eq!(profile.device.size as usize, layout.image_len());
                assert_eq!(profile.device.page_size, profile.device.size);
            }
        }
    }
}

#[test]
fn main_profiles_erase_whole_flash() {
    let mains = CATALOG.iter().filter(|p| p.region == Region::Main);
    for profile in mains {
        let size_kib: u16 = (profile.device.size >> 10) as u16;
        let mut sim = SimFlash::new(0x467, size_kib, OPTR_RESET & !optr::DUAL_BANK);
        let last: u32 = profile.end() - Page::SIZE;
        sim.preload(profile.device.start, &[0; 8]);
        sim.preload(last, &[0; 8]);

        let mut algo = Algorithm::init(sim, profile, profile.device.start, 0, Function::Erase);
        algo.erase_sector(last).unwrap();
        assert_eq!(algo.regs().byte(last), 0xFF, "{}", profile.device.name);
        assert_eq!(algo.regs().byte(profile.device.start), 0x00);

        algo.erase_chip().unwrap();
        assert_eq!(algo.regs().byte(profile.device.start), 0xFF);
        algo.uninit(Function::Erase);
        assert!(algo.regs().is_locked());
    }
}
