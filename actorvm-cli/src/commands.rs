//! CLI command implementations.
//!
//! Every command returns `Err(exit_code)` after printing its own diagnostics.

use std::fs;
use std::path::{Path, PathBuf};

use actorvm_common::program::MAGIC;
use actorvm_common::{Program, Scope};
use actorvm_vm::sandbox::SandboxWorld;
use actorvm_vm::{EntityId, FrameOutcome, PlayerId, RuntimeError, SectorId, VmConfig, VM};
use serde_json::{json, Map, Value};

/// Sectors in the world built by `run`. Every entity spawns in sector 0.
const SECTORS: i32 = 4;
const WALLS: i32 = 4;

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Program: a binary image or assembly text
    pub input: PathBuf,

    /// Actor kind to spawn, repeatable (defaults to every declared kind)
    #[arg(long = "kind", allow_hyphen_values = true)]
    pub kinds: Vec<i32>,

    /// Entities spawned per kind
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Ticks to simulate
    #[arg(long, default_value_t = 1)]
    pub ticks: u32,

    /// Event fired before every tick, repeatable
    #[arg(long = "event", allow_hyphen_values = true)]
    pub events: Vec<i32>,

    /// Players in the world
    #[arg(long, default_value_t = 1)]
    pub players: u16,

    /// JSON file with interpreter settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Assemble a text file to a binary image.
pub fn assemble(input: &Path, output: Option<&Path>) -> Result<(), i32> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("avmb"));

    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", input.display());
        1
    })?;

    let program = actorvm_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {}: {e}", input.display());
        1
    })?;

    let bytes = program.encode().map_err(|e| {
        eprintln!("error: {}: {e}", input.display());
        1
    })?;
    fs::write(&output, &bytes).map_err(|e| {
        eprintln!("error: cannot write '{}': {e}", output.display());
        1
    })?;

    eprintln!(
        "assembled {} words ({} bytes) -> {}",
        program.len(),
        bytes.len(),
        output.display()
    );
    Ok(())
}

/// Print a program as assembly text.
pub fn disassemble(input: &Path) -> Result<(), i32> {
    let program = load_program(input)?;
    print!("{}", actorvm_assembler::disassemble(&program));
    Ok(())
}

/// Statically check a program.
pub fn verify(input: &Path) -> Result<(), i32> {
    let program = load_program(input)?;
    check(&program)?;
    println!(
        "OK: {} ({} words, {} actor kinds, {} events)",
        input.display(),
        program.len(),
        program.actors.len(),
        program.events.len()
    );
    let digest = program.digest().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    println!("digest: {digest}");
    Ok(())
}

/// Verify a program and run it against a sandbox world.
pub fn run(args: &RunArgs) -> Result<(), i32> {
    let program = load_program(&args.input)?;
    check(&program)?;
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => VmConfig::default(),
    };

    let mut world = SandboxWorld::new(SECTORS, WALLS);
    for _ in 0..args.players {
        world.add_player();
    }
    let player = (args.players > 0).then_some(PlayerId(0));
    let kinds: Vec<i32> = if args.kinds.is_empty() {
        program.actors.keys().copied().collect()
    } else {
        args.kinds.clone()
    };

    let mut vm = VM::with_config(&program, config);
    let mut steps = Vec::new();

    let mut loaded = Vec::new();
    for &kind in &kinds {
        for _ in 0..args.count {
            let entity = world.spawn(kind, Some(SectorId(0)));
            log::debug!("spawned {entity} of kind {kind}");
            if let Some(outcome) = vm.run_load(&mut world, entity, player, 0).map_err(runtime)? {
                loaded.push((entity, outcome));
            }
        }
    }
    steps.push(Step::new("load".to_string(), &loaded));

    for tick in 1..=args.ticks {
        for &event in &args.events {
            vm.dispatch_event(&mut world, event, None, player, 0)
                .map_err(runtime)?;
        }
        let outcomes = vm.run_all(&mut world).map_err(runtime)?;
        steps.push(Step::new(format!("tick {tick}"), &outcomes));
    }

    let report = Report::collect(&program, &vm, &world, steps, args.players);
    if args.json {
        println!("{}", report.to_json());
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

/// Read a binary image, or assemble the file if it is not one.
fn load_program(path: &Path) -> Result<Program, i32> {
    let bytes = fs::read(path).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", path.display());
        1
    })?;

    if bytes.starts_with(MAGIC) {
        return Program::decode(&bytes).map_err(|e| {
            eprintln!("error: cannot decode '{}': {e}", path.display());
            1
        });
    }

    let text = String::from_utf8(bytes).map_err(|_| {
        eprintln!(
            "error: '{}' is neither a program image nor assembly text",
            path.display()
        );
        1
    })?;
    actorvm_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {}: {e}", path.display());
        1
    })
}

fn check(program: &Program) -> Result<(), i32> {
    actorvm_verifier::verify(program).map_err(|errors| {
        for e in &errors {
            eprintln!("error: {e}");
        }
        2
    })
}

fn read_config(path: &Path) -> Result<VmConfig, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", path.display());
        1
    })?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("error: invalid config '{}': {e}", path.display());
        1
    })
}

fn runtime(e: RuntimeError) -> i32 {
    eprintln!("runtime error: {e}");
    3
}

/// Frames run by one load pass or tick.
struct Step {
    label: String,
    frames: usize,
    deleted: Vec<EntityId>,
}

impl Step {
    fn new(label: String, outcomes: &[(EntityId, FrameOutcome)]) -> Self {
        let deleted = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome != FrameOutcome::Normal)
            .map(|(entity, _)| *entity)
            .collect();
        Self {
            label,
            frames: outcomes.len(),
            deleted,
        }
    }
}

struct EntityReport {
    id: EntityId,
    kind: i32,
    vars: Vec<(String, i32)>,
}

struct Report {
    steps: Vec<Step>,
    globals: Vec<(String, i32)>,
    entities: Vec<EntityReport>,
    players: Vec<Vec<(String, i32)>>,
    effects: Vec<(Option<EntityId>, String)>,
}

impl Report {
    fn collect(
        program: &Program,
        vm: &VM<'_>,
        world: &SandboxWorld,
        steps: Vec<Step>,
        players: u16,
    ) -> Self {
        let vars_in = |scope: Scope, entity: Option<EntityId>, player: Option<PlayerId>| {
            program
                .vars
                .iter()
                .enumerate()
                .filter(|(_, decl)| decl.scope == scope)
                .map(|(id, decl)| (decl.name.clone(), vm.vars().get(id as i32, entity, player)))
                .collect::<Vec<_>>()
        };

        let entities = world
            .live()
            .into_iter()
            .filter_map(|id| {
                let kind = world.entity(id)?.kind;
                Some(EntityReport {
                    id,
                    kind,
                    vars: vars_in(Scope::Actor, Some(id), None),
                })
            })
            .collect();

        Self {
            steps,
            globals: vars_in(Scope::Global, None, None),
            entities,
            players: (0..players)
                .map(|p| vars_in(Scope::Player, None, Some(PlayerId(p))))
                .collect(),
            effects: world
                .effects
                .iter()
                .map(|r| (r.entity, format!("{:?}", r.effect)))
                .collect(),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&format!(
                "{}: {} frames, {} deleted",
                step.label,
                step.frames,
                step.deleted.len()
            ));
            if !step.deleted.is_empty() {
                let ids: Vec<String> = step.deleted.iter().map(|e| e.to_string()).collect();
                out.push_str(&format!(" ({})", ids.join(", ")));
            }
            out.push('\n');
        }

        if !self.globals.is_empty() {
            out.push_str("globals:\n");
            push_vars(&mut out, &self.globals);
        }
        for entity in &self.entities {
            out.push_str(&format!("entity {} kind {}:\n", entity.id, entity.kind));
            push_vars(&mut out, &entity.vars);
        }
        for (index, vars) in self.players.iter().enumerate() {
            if !vars.is_empty() {
                out.push_str(&format!("player {index}:\n"));
                push_vars(&mut out, vars);
            }
        }

        out.push_str(&format!("effects: {}\n", self.effects.len()));
        for (entity, effect) in &self.effects {
            match entity {
                Some(entity) => out.push_str(&format!("  {entity} {effect}\n")),
                None => out.push_str(&format!("  - {effect}\n")),
            }
        }
        out
    }

    fn to_json(&self) -> Value {
        let steps: Vec<Value> = self
            .steps
            .iter()
            .map(|s| {
                let deleted: Vec<String> = s.deleted.iter().map(|e| e.to_string()).collect();
                json!({ "step": s.label, "frames": s.frames, "deleted": deleted })
            })
            .collect();
        let entities: Vec<Value> = self
            .entities
            .iter()
            .map(|e| json!({ "id": e.id.to_string(), "kind": e.kind, "vars": vars_json(&e.vars) }))
            .collect();
        let players: Vec<Value> = self.players.iter().map(|p| vars_json(p)).collect();
        let effects: Vec<Value> = self
            .effects
            .iter()
            .map(|(entity, effect)| {
                json!({ "entity": entity.map(|e| e.to_string()), "effect": effect })
            })
            .collect();

        json!({
            "steps": steps,
            "globals": vars_json(&self.globals),
            "entities": entities,
            "players": players,
            "effects": effects,
        })
    }
}

fn vars_json(vars: &[(String, i32)]) -> Value {
    let map: Map<String, Value> = vars
        .iter()
        .map(|(name, value)| (name.clone(), json!(value)))
        .collect();
    Value::Object(map)
}

fn push_vars(out: &mut String, vars: &[(String, i32)]) {
    for (name, value) in vars {
        out.push_str(&format!("  {name} = {value}\n"));
    }
}
