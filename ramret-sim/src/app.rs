//! The application the simulated device runs on every boot.

use bytemuck::{Pod, Zeroable};
use colored::Colorize;
use ramret::{
    InitLevel, InitPriority, InitQueue, NoInitArena, RetainedFlag, RetainedRecord,
    RetentionController, StartupHooks,
};

use crate::device::{Device, SimPower};

/// Where the `.noinit` section starts in the simulated RAM.
pub const NOINIT_OFFSET: usize = 0x2000;

/// Where the `.bss` section starts. The startup code clears it on every boot.
const BSS_OFFSET: usize = 0x100;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Custom {
    pub foo: i32,
    pub bar: f32,
    pub baz: [u8; 20],
}

impl Custom {
    fn label(&self) -> &str {
        let end = self
            .baz
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.baz.len());
        std::str::from_utf8(&self.baz[..end]).unwrap_or("<not utf-8>")
    }
}

/// What one boot observed and left behind.
#[derive(Debug)]
pub struct BootReport {
    pub validations: Vec<(&'static str, bool)>,
    pub counter: u32,
    pub uptime_ms: i64,
    pub custom: Custom,
    pub greeted_before: bool,
    pub non_retained: u32,
}

struct Context<'a> {
    controller: RetentionController<SimPower<'a>>,
    counter: &'a mut RetainedRecord<u32>,
    custom: &'a mut RetainedRecord<Custom>,
    validations: Vec<(&'static str, Result<bool, ramret::Error>)>,
}

fn validate_counter(context: &mut Context<'_>) {
    let result = context.counter.validate(&mut context.controller);
    context.validations.push(("counter", result));
}

fn validate_custom(context: &mut Context<'_>) {
    let result = context.custom.validate(&mut context.controller);
    context.validations.push(("custom", result));
}

/// Boots the device once, runs the application and returns what it saw.
/// The device is left running; call [`Device::system_off`] to power down.
pub fn boot(
    device: &mut Device,
    noinit_size: usize,
    uptime_ms: i64,
) -> anyhow::Result<BootReport> {
    let topology = device.topology()?;
    let (ram, power) = device.split();

    anyhow::ensure!(
        NOINIT_OFFSET + noinit_size <= ram.len(),
        "a no-init section of {noinit_size} bytes does not fit in RAM"
    );

    let (low, noinit) = ram.split_at_mut(NOINIT_OFFSET);
    let bss = &mut low[BSS_OFFSET..BSS_OFFSET + size_of::<u32>()];
    bss.fill(0);

    let arena = NoInitArena::new(&mut noinit[..noinit_size]);

    let mut context = Context {
        controller: RetentionController::new(topology, power),
        counter: arena.allocate_uninitialized()?,
        custom: arena.allocate_uninitialized()?,
        validations: Vec::new(),
    };
    let uptime = arena.allocate_uninitialized::<i64>()?;
    let greeted = arena.allocate_uninitialized::<RetainedFlag>()?;
    log::debug!("{arena:?}");

    let mut hooks = InitQueue::<Context<'_>, 4>::new();
    hooks.register(
        InitLevel::Application,
        InitPriority::RECORD_DEFAULT,
        validate_counter,
    )?;
    hooks.register(
        InitLevel::Application,
        InitPriority::RECORD_DEFAULT,
        validate_custom,
    )?;
    log::debug!("running {} startup hooks", hooks.len());
    hooks.run(&mut context);

    let Context {
        mut controller,
        counter,
        custom,
        validations,
    } = context;

    let mut validations = validations
        .into_iter()
        .map(|(name, result)| Ok((name, result?)))
        .collect::<Result<Vec<_>, ramret::Error>>()?;
    validations.push(("uptime", uptime.validate(&mut controller)?));
    validations.push(("greeted", greeted.validate(&mut controller)?));

    for (name, valid) in &validations {
        if !valid {
            log::warn!("retained record `{name}` did not survive and was reset");
        }
    }

    let non_retained = u32::from_le_bytes(<[u8; 4]>::try_from(&*bss)?) + 1;
    bss.copy_from_slice(&non_retained.to_le_bytes());

    for _ in 0..5 {
        let next = counter.value().wrapping_add(1);
        counter.set(next);
        counter.flush(&mut controller)?;
    }

    let value = custom.value_mut();
    value.foo = value.foo.wrapping_add(5);
    value.bar += 5.0;
    if value.label().is_empty() {
        value.baz[..7].copy_from_slice(b"ramret!");
    }
    custom.flush(&mut controller)?;

    let greeted_before = greeted.value().get();
    if greeted.value().is_default() {
        greeted.set(RetainedFlag::configured(true));
        greeted.flush(&mut controller)?;
    }

    let total = uptime.value().wrapping_add(uptime_ms);
    uptime.set(total);
    uptime.flush(&mut controller)?;

    Ok(BootReport {
        validations,
        counter: *counter.value(),
        uptime_ms: *uptime.value(),
        custom: *custom.value(),
        greeted_before,
        non_retained,
    })
}

impl BootReport {
    pub fn print(&self, boot: usize) {
        println!("{}", format!("boot {boot}").bold());

        if !self.greeted_before {
            println!("  {}", "first boot with retained flags".cyan());
        }

        for (name, valid) in &self.validations {
            let status = if *valid {
                "valid".green()
            } else {
                "reset".yellow()
            };
            println!("  {name:<8} {status}");
        }

        println!("  retained counter:     {}", self.counter);
        println!("  non-retained counter: {}", self.non_retained);
        println!("  powered up for:       {} ms", self.uptime_ms);
        println!(
            "  custom:               foo={} bar={:.1} baz={:?}",
            self.custom.foo,
            self.custom.bar,
            self.custom.label()
        );
    }
}
