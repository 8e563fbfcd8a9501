//! Fake-data built-ins for request bodies: `email()`, `phone()`,
//! `address()`, `words([n])`, `name()` and `domain()`.

use std::sync::{Arc, Mutex};

use crate::script::{ErrorKind, Interpreter, NativeFn, Value};

const FIRST: &[&str] = &[
    "ann", "bob", "carla", "dmitri", "emma", "farid", "grace", "hugo", "ines", "jonas", "kaito",
    "lena", "marco", "nora", "oscar", "priya", "quinn", "rosa", "sven", "tara",
];
const LAST: &[&str] = &[
    "adams", "baker", "chen", "diaz", "evans", "fischer", "garcia", "hansen", "ito", "jensen",
    "kowalski", "larsen", "moreau", "novak", "okafor", "petrov", "rossi", "silva",
];
const STREETS: &[&str] = &[
    "Oak", "Maple", "Cedar", "Elm", "Hill", "Lake", "Park", "River", "Sunset", "Mill",
];
const STREET_KINDS: &[&str] = &["Street", "Avenue", "Road", "Lane", "Drive", "Court"];
const WORDS: &[&str] = &[
    "alpha", "amber", "bright", "cloud", "delta", "ember", "forest", "glass", "harbor", "iron",
    "jade", "kernel", "lumen", "meadow", "north", "orbit", "pixel", "quartz", "river", "stone",
    "tidal", "umber", "velvet", "willow", "yonder", "zephyr",
];
const ZONES: &[&str] = &["com", "net", "org", "io", "dev", "info", "biz"];
const DEFAULT_WORDS: usize = 3;

// ── Minimal PRNG (xorshift64) ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Rng(u64);

impl Rng {
    pub fn seeded(seed: u64) -> Self {
        // xorshift64 requires a non-zero state.
        Rng(if seed == 0 { 0x517c_c1b7_2722_0a95 } else { seed })
    }

    /// Seed from the clock.
    pub fn from_time() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        Self::seeded(ns ^ 0x9e37_79b9_7f4a_7c15)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform-ish in `0..n`; `n` must be non-zero.
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a>(&mut self, from: &[&'a str]) -> &'a str {
        from[self.below(from.len())]
    }

    fn digits(&mut self, n: usize) -> String {
        (0..n).map(|_| char::from(b'0' + self.below(10) as u8)).collect()
    }

    pub fn name(&mut self) -> String {
        format!("{} {}", capitalize(self.pick(FIRST)), capitalize(self.pick(LAST)))
    }

    pub fn domain(&mut self) -> String {
        format!("{}{}.{}", self.pick(WORDS), self.pick(WORDS), self.pick(ZONES))
    }

    pub fn email(&mut self) -> String {
        let user = format!("{}.{}{}", self.pick(FIRST), self.pick(LAST), self.below(100));
        format!("{user}@{}", self.domain())
    }

    pub fn phone(&mut self) -> String {
        format!("+1-{}-{}-{}", self.digits(3), self.digits(3), self.digits(4))
    }

    pub fn address(&mut self) -> String {
        format!(
            "{} {} {}",
            1 + self.below(9999),
            self.pick(STREETS),
            self.pick(STREET_KINDS)
        )
    }

    pub fn words(&mut self, n: usize) -> String {
        (0..n).map(|_| self.pick(WORDS)).collect::<Vec<_>>().join(" ")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Registration ──────────────────────────────────────────────────────────────

const SIMPLE: &[(&str, fn(&mut Rng) -> String)] = &[
    ("email", Rng::email),
    ("phone", Rng::phone),
    ("address", Rng::address),
    ("name", Rng::name),
    ("domain", Rng::domain),
];

fn words(rng: &mut Rng, args: &[Value]) -> Result<String, ErrorKind> {
    let n = match args {
        [] => DEFAULT_WORDS,
        [Value::Int(n)] if *n >= 0 => *n as usize,
        [other] => {
            return Err(ErrorKind::InvalidArgument(format!(
                "words: expected a non-negative int, got {}",
                other.type_name()
            )))
        }
        _ => return Err(ErrorKind::arity("words", "0 or 1", args.len())),
    };
    Ok(rng.words(n))
}

fn native<F>(rng: &Arc<Mutex<Rng>>, name: &'static str, generate: F) -> NativeFn
where
    F: Fn(&mut Rng, &[Value]) -> Result<String, ErrorKind> + Send + Sync + 'static,
{
    let rng = Arc::clone(rng);
    Arc::new(move |_: &mut Interpreter, args: &[Value]| {
        let mut rng = rng
            .lock()
            .map_err(|_| ErrorKind::InvalidArgument(format!("{name}: generator state poisoned")))?;
        generate(&mut *rng, args).map(Value::Str)
    })
}

/// Register every generator on `interp`, sharing one generator state.
pub fn register(interp: &mut Interpreter, rng: Rng) -> Result<(), ErrorKind> {
    let rng = Arc::new(Mutex::new(rng));
    for &(name, generate) in SIMPLE {
        interp.register_function(
            name,
            native(&rng, name, move |r, args| {
                if args.is_empty() {
                    Ok(generate(r))
                } else {
                    Err(ErrorKind::arity(name, "0", args.len()))
                }
            }),
        )?;
    }
    interp.register_function("words", native(&rng, "words", words))?;
    tracing::trace!(count = SIMPLE.len() + 1, "fake-data built-ins registered");
    Ok(())
}
