//! This demo builds a process view over a raw memory image without any OS
//! support.
//!
//! The paging root can be given on the command line. Otherwise the image is
//! scanned for the Windows `System` process object and the paging root is
//! taken from there.
//!
//! ```text
//! cargo run --example fallback -- memory.raw [0x1aa000]
//! ```

use std::sync::Arc;

use memproc::{
    NoOs, Pa, PhysicalMemory as _, Vmm, VmmConfig, driver::file::FileDriver,
    os::windows::scan_for_paging_root,
};

fn parse_address(value: &str) -> Result<Pa, std::num::ParseIntError> {
    let value = value.trim_start_matches("0x");
    Ok(Pa(u64::from_str_radix(value, 16)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: fallback <image> [paging root]")?;

    let driver = FileDriver::new(&path)?;

    let paging_root = match args.next() {
        Some(value) => parse_address(&value)?,
        None => {
            let max_address = driver.info()?.max_address;

            tracing::info!(%max_address, "no paging root given, scanning image");
            scan_for_paging_root(&driver, Pa(0)..max_address)?
                .ok_or("system process not found; specify the paging root")?
        }
    };

    let config = VmmConfig::default().with_paging_root(paging_root);
    let vmm = Arc::new(Vmm::new(driver, NoOs, config)?);
    vmm.initialize()?;

    println!("System: {:?} ({:?})", vmm.system(), vmm.memory_model());
    println!("Paging root: {}", vmm.kernel_dtb());
    println!("=================================================");

    for process in vmm.processes().generation().iter() {
        println!(
            "[{:>5}] {:<16} DTB: {} parent: {}",
            u32::from(process.id()),
            process.name(),
            process.dtb(),
            process.parent_id()
        );
    }

    println!("=================================================");
    println!("{:#?}", vmm.statistics().snapshot());

    Ok(())
}
