use std::fs;
use std::path::Path;

use anyhow::Context;
use ramret::{RamTopology, RetentionHardware, SectionBitmask};
use ramret_reg::{RAM_BLOCK_COUNT, RamPower, retention_bits};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Chip {
    Nrf52832,
    Nrf52840,
}

impl Chip {
    pub const fn ram_size(self) -> usize {
        match self {
            Chip::Nrf52832 => 64 * 1024,
            Chip::Nrf52840 => 256 * 1024,
        }
    }
}

/// RAM power register value after reset: every section on, none retained.
fn reset_register() -> u32 {
    u32::from(RamPower::new(0xFFFF, 0))
}

/// A simulated nRF52: its RAM and the `RAM[n].POWER` registers.
///
/// RAM is kept as words so the buffer is 8 byte aligned wherever it ends up,
/// which keeps record addresses stable from one run to the next.
#[derive(Serialize, Deserialize)]
pub struct Device {
    chip: Chip,
    ram: Vec<u64>,
    registers: Vec<u32>,
}

impl Device {
    /// A device straight out of a cold power-on, with random RAM.
    pub fn cold(chip: Chip, rng: &mut fastrand::Rng) -> Self {
        let ram = (0..chip.ram_size() / size_of::<u64>())
            .map(|_| rng.u64(..))
            .collect();

        Self {
            chip,
            ram,
            registers: vec![reset_register(); RAM_BLOCK_COUNT],
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let device: Device = postcard::from_bytes(&data)
            .with_context(|| format!("{} is not a device image", path.display()))?;

        anyhow::ensure!(
            device.ram.len() * size_of::<u64>() == device.chip.ram_size()
                && device.registers.len() == RAM_BLOCK_COUNT,
            "{} is corrupt",
            path.display()
        );

        Ok(device)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = postcard::to_allocvec(self)?;
        fs::write(path, data).with_context(|| format!("writing {}", path.display()))
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// The topology of the simulated RAM, anchored at the host buffer.
    pub fn topology(&self) -> anyhow::Result<RamTopology> {
        RamTopology::new(
            self.ram.as_ptr().addr(),
            self.chip.ram_size(),
            ramret::NRF52_SMALL_SECTIONS,
            ramret::NRF52_SMALL_BLOCK_COUNT,
            ramret::NRF52_LARGE_SECTIONS,
        )
        .context("simulated RAM geometry")
    }

    /// The RAM as bytes together with the POWER peripheral driving it, so
    /// records can be handed out of one while the other is used for
    /// retention.
    pub fn split(&mut self) -> (&mut [u8], SimPower<'_>) {
        (
            bytemuck::cast_slice_mut(&mut self.ram),
            SimPower {
                registers: &mut self.registers,
            },
        )
    }

    /// Enters System OFF and wakes up again.
    ///
    /// Every section without its retention bit set loses its content. The
    /// retention configuration itself does not survive either.
    pub fn system_off(&mut self, rng: &mut fastrand::Rng) -> anyhow::Result<()> {
        let topology = self.topology()?;
        let base = topology.ram_begin();
        let registers = &self.registers;
        let ram: &mut [u8] = bytemuck::cast_slice_mut(&mut self.ram);

        for section in topology.sections() {
            let retained = registers
                .get(section.block)
                .map(|&register| RamPower::from(register).retention())
                .is_some_and(|bits| bits & (1 << section.index) != 0);

            if retained {
                log::debug!(
                    "RAM[{}] section {} retained ({:#x}..{:#x})",
                    section.block,
                    section.index,
                    section.begin - base,
                    section.end - base
                );
            } else {
                rng.fill(&mut ram[section.begin - base..section.end - base]);
            }
        }

        self.registers.fill(reset_register());
        log::info!("System OFF, woken by reset");

        Ok(())
    }
}

/// [`RetentionHardware`] backed by the simulated registers, applying writes
/// the way `POWERSET` and `POWERCLR` do.
pub struct SimPower<'a> {
    registers: &'a mut [u32],
}

impl RetentionHardware for SimPower<'_> {
    fn set_block_retention(&mut self, bits: SectionBitmask, enable: bool) {
        let Some(register) = self.registers.get_mut(bits.block_index) else {
            log::error!("write to missing register RAM[{}]", bits.block_index);
            return;
        };

        let next = RamPower::from(*register).apply(retention_bits(bits), enable);
        log::trace!(
            "RAM[{}].{} {:#06x} -> {:?}",
            bits.block_index,
            if enable { "POWERSET" } else { "POWERCLR" },
            bits.mask,
            next
        );

        *register = u32::from(next);
    }
}
