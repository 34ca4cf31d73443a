use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use memproc_core::{
    Gfn, NoOs, PAGE_SIZE, Pa, PhysicalMemory, ProcessId, RefreshState, SystemType, Vmm,
    VmmConfig, VmmError,
};
use memproc_driver_file::{Error, FileDriver};

/// A memory image in the temporary directory, removed on drop.
struct Image(PathBuf);

impl Image {
    fn new(content: &[u8]) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let path = std::env::temp_dir().join(format!(
            "memproc-driver-file-{}-{}.raw",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&path, content).expect("write image");
        Self(path)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn pattern(pages: usize) -> Vec<u8> {
    (0..pages * PAGE_SIZE as usize)
        .map(|index| (index / PAGE_SIZE as usize) as u8 + 1)
        .collect()
}

#[test]
fn reads_pages() -> Result<(), VmmError> {
    let image = Image::new(&pattern(4));
    let driver = FileDriver::new(&image.0)?;

    assert_eq!(driver.len(), 4 * PAGE_SIZE);

    let page = driver.read_page(Gfn(2))?;
    assert_eq!(page.len(), PAGE_SIZE as usize);
    assert!(page.iter().all(|&byte| byte == 3));

    Ok(())
}

#[test]
fn reads_past_end_are_not_present() -> Result<(), VmmError> {
    let image = Image::new(&pattern(2));
    let driver = FileDriver::new(&image.0)?;

    assert!(matches!(
        driver.read_page(Gfn(2)),
        Err(VmmError::PageNotPresent(Pa(0x2000)))
    ));
    assert!(matches!(
        driver.read_page(Gfn(u64::MAX >> 12)),
        Err(VmmError::PageNotPresent(_))
    ));

    Ok(())
}

#[test]
fn partial_last_page_is_zero_padded() -> Result<(), VmmError> {
    let mut content = pattern(1);
    content.extend_from_slice(&[0xaa; 0x10]);

    let image = Image::new(&content);
    let driver = FileDriver::new(&image.0)?;

    let page = driver.read_page(Gfn(1))?;
    assert_eq!(page.len(), PAGE_SIZE as usize);
    assert!(page[..0x10].iter().all(|&byte| byte == 0xaa));
    assert!(page[0x10..].iter().all(|&byte| byte == 0));

    Ok(())
}

#[test]
fn images_are_static() -> Result<(), VmmError> {
    let image = Image::new(&pattern(3));
    let driver = FileDriver::new(&image.0)?;

    let info = driver.info()?;
    assert_eq!(info.max_address, Pa(3 * PAGE_SIZE));
    assert!(!info.volatile);
    assert!(!info.remote);
    assert!(!info.volatile_max_address);
    assert_eq!(driver.max_address(), None);

    Ok(())
}

#[test]
fn empty_and_missing_images_are_rejected() {
    let image = Image::new(&[]);
    assert!(matches!(FileDriver::new(&image.0), Err(Error::Empty)));

    let missing = std::env::temp_dir().join("memproc-driver-file-does-not-exist.raw");
    assert!(matches!(FileDriver::new(missing), Err(Error::Io(_))));
}

#[test]
fn bootstrap_over_image() -> Result<(), VmmError> {
    let image = Image::new(&pattern(16));

    let config = VmmConfig::default().with_paging_root(Pa(0x3000));
    let vmm = Arc::new(Vmm::new(FileDriver::new(&image.0)?, NoOs, config)?);
    vmm.initialize()?;

    assert_eq!(vmm.system(), SystemType::UnknownX64);
    assert_eq!(
        vmm.process(ProcessId::UNKNOWN).map(|process| process.dtb()),
        Some(Pa(0x3000))
    );
    assert_eq!(vmm.refresh_state(), RefreshState::Stopped);

    let mut buffer = [0u8; 8];
    vmm.lock().read_physical(Pa(0x2ffc), &mut buffer)?;
    assert_eq!(buffer, [3, 3, 3, 3, 4, 4, 4, 4]);

    Ok(())
}
