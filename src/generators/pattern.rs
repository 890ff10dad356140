//! Strings matching a regular expression
//!
//! The pattern is parsed with `regex-syntax` and its HIR is folded into a
//! small tree annotated with the minimum and maximum length (in characters)
//! of the strings each node can produce. Synthesis walks that tree once:
//! repetition counts are drawn within their bounds (unbounded ones are capped
//! by the size parameter), classes are intersected with the XML character
//! range, and anchors are honoured while walking, backtracking only to the
//! nearest alternation. Every node visit and every emitted character costs a
//! step; running out of steps fails with `PatternTooComplex`.

use crate::limits::GeneratorConfig;
use crate::error::{Error, Result};
use crate::schema::patterns;
use rand::Rng;
use regex_syntax::hir::{Class, Hir, HirKind, Literal, Look};
use regex_syntax::ParserBuilder;
use std::sync::Arc;

use super::Gen;

const XML_CHAR_RANGES: &[(u32, u32)] = &[
    (0x9, 0xA),
    (0xD, 0xD),
    (0x20, 0xD7FF),
    (0xE000, 0xFFFD),
    (0x10000, 0x10FFFF),
];
const PRINTABLE_ASCII: (u32, u32) = (0x20, 0x7E);
const ANCHOR_ATTEMPTS: usize = 8;

/// Regular expression dialect of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    /// XSD pattern facet: implicitly anchored, `^`/`$` are literals
    Xsd,
    /// `regex` crate syntax; `^`/`$` are anchors
    Regex,
}

/// Set of characters a class may produce
#[derive(Debug)]
struct CharSet {
    ranges: Vec<(u32, u32)>,
    total: u64,
    ascii: Vec<(u32, u32)>,
    ascii_total: u64,
}

impl CharSet {
    fn new(class_ranges: impl Iterator<Item = (u32, u32)>) -> Option<Self> {
        let mut ranges = Vec::new();
        for (lo, hi) in class_ranges {
            for &(xlo, xhi) in XML_CHAR_RANGES {
                let (a, b) = (lo.max(xlo), hi.min(xhi));
                if a <= b {
                    ranges.push((a, b));
                }
            }
        }
        if ranges.is_empty() {
            return None;
        }
        let ascii: Vec<(u32, u32)> = ranges
            .iter()
            .filter_map(|&(lo, hi)| {
                let (a, b) = (lo.max(PRINTABLE_ASCII.0), hi.min(PRINTABLE_ASCII.1));
                (a <= b).then_some((a, b))
            })
            .collect();
        let count = |rs: &[(u32, u32)]| rs.iter().map(|(a, b)| (b - a) as u64 + 1).sum();
        Some(Self {
            total: count(&ranges),
            ascii_total: count(&ascii),
            ranges,
            ascii,
        })
    }

    fn pick<R: Rng + ?Sized>(&self, rng: &mut R, ascii_bias: f64) -> Option<char> {
        let (ranges, total) = if self.ascii_total > 0 && rng.random_bool(ascii_bias) {
            (&self.ascii, self.ascii_total)
        } else {
            (&self.ranges, self.total)
        };
        let mut index = rng.random_range(0..total);
        for &(lo, hi) in ranges {
            let width = (hi - lo) as u64 + 1;
            if index < width {
                return char::from_u32(lo + index as u32);
            }
            index -= width;
        }
        None
    }
}

#[derive(Debug)]
enum NodeKind {
    Empty,
    Literal(Vec<char>),
    Class(CharSet),
    Start,
    End,
    Repeat {
        sub: Box<Node>,
        min: u32,
        max: Option<u32>,
    },
    Concat(Vec<Node>),
    Alternation(Vec<Node>),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    min_len: usize,
    max_len: Option<usize>,
}

impl Node {
    fn leaf(kind: NodeKind, len: usize) -> Self {
        Self {
            kind,
            min_len: len,
            max_len: Some(len),
        }
    }

    /// Fold a HIR; `None` means no string matches
    fn from_hir(hir: &Hir) -> Result<Option<Node>> {
        let node = match hir.kind() {
            HirKind::Empty => Node::leaf(NodeKind::Empty, 0),
            HirKind::Literal(Literal(bytes)) => {
                let text = String::from_utf8_lossy(bytes);
                let chars: Vec<char> = text.chars().collect();
                if !chars.iter().all(|c| crate::names::is_xml_char(*c)) {
                    return Ok(None);
                }
                let len = chars.len();
                Node::leaf(NodeKind::Literal(chars), len)
            }
            HirKind::Class(Class::Unicode(cls)) => {
                match CharSet::new(cls.iter().map(|r| (r.start() as u32, r.end() as u32))) {
                    Some(set) => Node::leaf(NodeKind::Class(set), 1),
                    None => return Ok(None),
                }
            }
            HirKind::Class(Class::Bytes(cls)) => {
                let ascii = cls
                    .iter()
                    .filter(|r| r.start() < 0x80)
                    .map(|r| (r.start() as u32, r.end().min(0x7F) as u32));
                match CharSet::new(ascii) {
                    Some(set) => Node::leaf(NodeKind::Class(set), 1),
                    None => return Ok(None),
                }
            }
            HirKind::Look(look) => match look {
                Look::Start | Look::StartLF | Look::StartCRLF => Node::leaf(NodeKind::Start, 0),
                Look::End | Look::EndLF | Look::EndCRLF => Node::leaf(NodeKind::End, 0),
                other => {
                    return Err(Error::SchemaUnsupportedConstruct(format!(
                        "look-around assertion {:?} in pattern",
                        other
                    )))
                }
            },
            HirKind::Repetition(rep) => {
                let sub = match Node::from_hir(&rep.sub)? {
                    Some(sub) => sub,
                    None if rep.min == 0 => return Ok(Some(Node::leaf(NodeKind::Empty, 0))),
                    None => return Ok(None),
                };
                let min_len = sub.min_len.saturating_mul(rep.min as usize);
                let max_len = match (sub.max_len, rep.max) {
                    (Some(0), _) => Some(0),
                    (Some(m), Some(n)) => Some(m.saturating_mul(n as usize)),
                    _ => None,
                };
                Node {
                    kind: NodeKind::Repeat {
                        sub: Box::new(sub),
                        min: rep.min,
                        max: rep.max,
                    },
                    min_len,
                    max_len,
                }
            }
            HirKind::Capture(cap) => return Node::from_hir(&cap.sub),
            HirKind::Concat(subs) => {
                let mut children = Vec::with_capacity(subs.len());
                for sub in subs {
                    match Node::from_hir(sub)? {
                        Some(child) => children.push(child),
                        None => return Ok(None),
                    }
                }
                let min_len = children
                    .iter()
                    .map(|c| c.min_len)
                    .fold(0usize, usize::saturating_add);
                let max_len = children
                    .iter()
                    .map(|c| c.max_len)
                    .try_fold(0usize, |acc, m| m.map(|m| acc.saturating_add(m)));
                Node {
                    kind: NodeKind::Concat(children),
                    min_len,
                    max_len,
                }
            }
            HirKind::Alternation(alts) => {
                let mut branches = Vec::with_capacity(alts.len());
                for alt in alts {
                    if let Some(branch) = Node::from_hir(alt)? {
                        branches.push(branch);
                    }
                }
                if branches.is_empty() {
                    return Ok(None);
                }
                let min_len = branches.iter().map(|b| b.min_len).min().unwrap_or(0);
                let max_len = branches
                    .iter()
                    .map(|b| b.max_len)
                    .try_fold(0usize, |acc, m| m.map(|m| acc.max(m)));
                Node {
                    kind: NodeKind::Alternation(branches),
                    min_len,
                    max_len,
                }
            }
        };
        Ok(Some(node))
    }

    fn admits(&self, target: usize) -> bool {
        target >= self.min_len && self.max_len.map_or(true, |m| target <= m)
    }
}

/// Why a walk stopped
enum Halt {
    /// Anchors could not be honoured on this path
    Dead,
    /// Step budget exhausted
    Budget,
}

type Step = std::result::Result<(), Halt>;

/// Generator of strings matching one pattern
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    source: String,
    root: Arc<Node>,
    max_steps: usize,
    max_unbounded: u32,
    ascii_bias: f64,
}

impl PatternGenerator {
    /// Parse a pattern in the given dialect
    pub fn new(pattern: &str, syntax: PatternSyntax, config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let translated = match syntax {
            PatternSyntax::Xsd => patterns::translate(pattern)?,
            PatternSyntax::Regex => pattern.to_string(),
        };
        let hir = ParserBuilder::new()
            .build()
            .parse(&translated)
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        let root = Node::from_hir(&hir)?
            .ok_or_else(|| {
                Error::unsatisfiable(pattern, "a required part matches no XML character")
            })?;
        tracing::debug!(
            pattern,
            min_len = root.min_len,
            max_len = ?root.max_len,
            "compiled pattern generator"
        );
        Ok(Self {
            source: pattern.to_string(),
            root: Arc::new(root),
            max_steps: config.max_pattern_steps,
            max_unbounded: config.max_unbounded_occurs,
            ascii_bias: config.ascii_bias,
        })
    }

    /// Parse an XSD pattern facet
    pub fn xsd(pattern: &str, config: &GeneratorConfig) -> Result<Self> {
        Self::new(pattern, PatternSyntax::Xsd, config)
    }

    /// The pattern as written
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Shortest possible match length
    pub fn min_len(&self) -> usize {
        self.root.min_len
    }

    /// Longest possible match length, if bounded
    pub fn max_len(&self) -> Option<usize> {
        self.root.max_len
    }

    /// Synthesize a matching string
    ///
    /// `window` is an optional `[min, max]` length window; a target length is
    /// drawn inside it and used to steer repetition counts.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u32,
        window: Option<(usize, Option<usize>)>,
    ) -> Result<String> {
        let target = match window {
            None => None,
            Some((lo, hi)) => {
                let lo = lo.max(self.root.min_len);
                let hi = match (hi, self.root.max_len) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                let soft_hi = lo.saturating_add(size as usize);
                let hi = hi.map_or(soft_hi, |h| h.min(soft_hi.max(lo)));
                if lo > hi {
                    return Err(Error::unsatisfiable(
                        &self.source,
                        format!("no match has a length between {} and {}", lo, hi),
                    ));
                }
                Some(rng.random_range(lo..=hi))
            }
        };

        let mut steps = 0;
        for _ in 0..ANCHOR_ATTEMPTS {
            let mut run = Run {
                gen: self,
                rng: &mut *rng,
                out: String::new(),
                len: 0,
                ended: false,
                steps,
                cap: size.min(self.max_unbounded),
            };
            match run.walk(&self.root, target) {
                Ok(()) => return Ok(run.out),
                Err(Halt::Dead) => steps = run.steps,
                Err(Halt::Budget) => {
                    tracing::warn!(
                        pattern = %self.source,
                        steps = run.steps,
                        "pattern step budget exhausted"
                    );
                    return Err(Error::PatternTooComplex {
                        pattern: self.source.clone(),
                        steps: run.steps,
                    });
                }
            }
        }
        Err(Error::unsatisfiable(&self.source, "anchors cannot be satisfied"))
    }

    /// Generator drawing strings at the context's size
    pub fn to_gen(&self) -> Gen<String> {
        let this = self.clone();
        Gen::from_fn(move |ctx| {
            let size = ctx.size;
            this.generate(&mut *ctx.rng, size, None)
        })
    }
}

struct Run<'g, R: Rng + ?Sized> {
    gen: &'g PatternGenerator,
    rng: &'g mut R,
    out: String,
    len: usize,
    ended: bool,
    steps: usize,
    cap: u32,
}

impl<R: Rng + ?Sized> Run<'_, R> {
    fn step(&mut self) -> Step {
        self.steps += 1;
        if self.steps > self.gen.max_steps {
            Err(Halt::Budget)
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, c: char) -> Step {
        if self.ended {
            return Err(Halt::Dead);
        }
        self.out.push(c);
        self.len += 1;
        self.step()
    }

    fn walk(&mut self, node: &Node, target: Option<usize>) -> Step {
        self.step()?;
        match &node.kind {
            NodeKind::Empty => Ok(()),
            NodeKind::Literal(chars) => chars.iter().try_for_each(|c| self.emit(*c)),
            NodeKind::Class(set) => {
                let c = set.pick(self.rng, self.gen.ascii_bias).ok_or(Halt::Dead)?;
                self.emit(c)
            }
            NodeKind::Start => {
                if self.len == 0 {
                    Ok(())
                } else {
                    Err(Halt::Dead)
                }
            }
            NodeKind::End => {
                self.ended = true;
                Ok(())
            }
            NodeKind::Repeat { sub, min, max } => {
                let count = self.repeat_count(sub, *min, *max, target);
                let bounds = vec![(sub.min_len, sub.max_len); count as usize];
                let targets = self.split(target, &bounds);
                for t in targets {
                    self.walk(sub, t)?;
                }
                Ok(())
            }
            NodeKind::Concat(children) => {
                let bounds: Vec<_> = children.iter().map(|c| (c.min_len, c.max_len)).collect();
                let targets = self.split(target, &bounds);
                for (child, t) in children.iter().zip(targets) {
                    self.walk(child, t)?;
                }
                Ok(())
            }
            NodeKind::Alternation(branches) => {
                let mut candidates: Vec<&Node> = match target {
                    Some(t) => branches.iter().filter(|b| b.admits(t)).collect(),
                    None => branches.iter().collect(),
                };
                if candidates.is_empty() {
                    candidates = branches.iter().collect();
                }
                let start = self.rng.random_range(0..candidates.len());
                candidates.rotate_left(start);
                let (mark_bytes, mark_len, mark_ended) = (self.out.len(), self.len, self.ended);
                for branch in candidates {
                    match self.walk(branch, target) {
                        Ok(()) => return Ok(()),
                        Err(Halt::Dead) => {
                            self.out.truncate(mark_bytes);
                            self.len = mark_len;
                            self.ended = mark_ended;
                        }
                        Err(Halt::Budget) => return Err(Halt::Budget),
                    }
                }
                Err(Halt::Dead)
            }
        }
    }

    fn repeat_count(
        &mut self,
        sub: &Node,
        min: u32,
        max: Option<u32>,
        target: Option<usize>,
    ) -> u32 {
        if self.ended {
            return min;
        }
        let upper = max.unwrap_or(u32::MAX);
        if let Some(t) = target {
            let lo = match sub.max_len {
                Some(0) => 0,
                Some(m) => t.div_ceil(m).min(u32::MAX as usize) as u32,
                None => u32::from(t > 0),
            };
            let hi = if sub.min_len == 0 {
                u32::MAX
            } else {
                (t / sub.min_len).min(u32::MAX as usize) as u32
            };
            let lo = lo.max(min);
            let hi = hi.min(upper).min(lo.saturating_add(self.cap.max(1)));
            if lo <= hi {
                return self.rng.random_range(lo..=hi);
            }
        }
        let hi = upper.min(min.saturating_add(self.cap));
        if hi <= min {
            min
        } else {
            self.rng.random_range(min..=hi)
        }
    }

    /// Distribute a target length over consecutive parts
    fn split(
        &mut self,
        target: Option<usize>,
        bounds: &[(usize, Option<usize>)],
    ) -> Vec<Option<usize>> {
        let Some(total) = target else {
            return vec![None; bounds.len()];
        };
        let n = bounds.len();
        let mut suffix_min = vec![0usize; n + 1];
        let mut suffix_max: Vec<Option<usize>> = vec![Some(0); n + 1];
        for i in (0..n).rev() {
            suffix_min[i] = suffix_min[i + 1].saturating_add(bounds[i].0);
            suffix_max[i] = match (suffix_max[i + 1], bounds[i].1) {
                (Some(a), Some(b)) => Some(a.saturating_add(b)),
                _ => None,
            };
        }
        let mut remaining = total;
        let mut targets = Vec::with_capacity(n);
        for (i, &(min, max)) in bounds.iter().enumerate() {
            let lo = match suffix_max[i + 1] {
                Some(rest) => min.max(remaining.saturating_sub(rest)),
                None => min,
            };
            let hi = max
                .unwrap_or(usize::MAX)
                .min(remaining.saturating_sub(suffix_min[i + 1]));
            let chosen = if lo >= hi {
                lo
            } else {
                self.rng.random_range(lo..=hi)
            };
            remaining = remaining.saturating_sub(chosen);
            targets.push(Some(chosen));
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> GeneratorConfig {
        GeneratorConfig::default()
    }

    #[test]
    fn test_lowercase_plus_matches() {
        let gen = PatternGenerator::xsd("[a-z]+", &config()).unwrap();
        let re = patterns::compile("[a-z]+").unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let s = gen.generate(&mut rng, 10, None).unwrap();
            assert!(re.is_match(&s), "{:?}", s);
            assert!((1..=11).contains(&s.len()));
        }
    }

    #[test]
    fn test_out_of_range_bias_is_rejected() {
        let config = GeneratorConfig {
            ascii_bias: 1.5,
            ..config()
        };
        let err = PatternGenerator::xsd("[a-z]+", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let gen = PatternGenerator::xsd(r"\d{3}-[A-Z]{2}(x|yz)*", &config()).unwrap();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..5)
                .map(|_| gen.generate(&mut rng, 8, None).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_xsd_facet_patterns() {
        let mut rng = StdRng::seed_from_u64(1);
        for pattern in [
            r"\d{3}-[A-Z]{2}",
            r"[\i-[:]][\c-[:]]*",
            r"\p{IsGreek}{3}",
            r"(ab|cd)?e{2,3}",
            r"[a-z-[aeiou]]{4}",
            r"\w+@\w+\.com",
        ] {
            let gen = PatternGenerator::xsd(pattern, &config()).unwrap();
            let re = patterns::compile(pattern).unwrap();
            for size in [0, 3, 30] {
                let s = gen.generate(&mut rng, size, None).unwrap();
                assert!(re.is_match(&s), "{} produced {:?}", pattern, s);
            }
        }
    }

    #[test]
    fn test_colon_between_wildcards() {
        let gen = PatternGenerator::xsd(".*:.*", &config()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for size in [0, 10, 1000] {
            let s = gen.generate(&mut rng, size, None).unwrap();
            assert!(s.contains(':'));
            assert!(!s.contains('\n'));
        }
    }

    #[test]
    fn test_length_window_steers_repetition() {
        let gen = PatternGenerator::xsd("[a-z]*(-[0-9]+)?", &config()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let s = gen.generate(&mut rng, 20, Some((5, Some(7)))).unwrap();
            assert!((5..=7).contains(&s.chars().count()), "{:?}", s);
        }
        let err = PatternGenerator::xsd("[a-z]{2,4}", &config())
            .unwrap()
            .generate(&mut rng, 5, Some((10, None)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternUnsatisfiable);
    }

    #[test]
    fn test_step_budget() {
        let gen = PatternGenerator::xsd("(a{1000}){1000}", &config()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = gen.generate(&mut rng, 1, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternTooComplex);
    }

    #[test]
    fn test_anchors_in_regex_syntax() {
        let cfg = config();
        let mut rng = StdRng::seed_from_u64(3);
        let gen = PatternGenerator::new("^abc$", PatternSyntax::Regex, &cfg).unwrap();
        assert_eq!(gen.generate(&mut rng, 5, None).unwrap(), "abc");

        let gen = PatternGenerator::new("(x|^)y", PatternSyntax::Regex, &cfg).unwrap();
        for _ in 0..10 {
            let s = gen.generate(&mut rng, 5, None).unwrap();
            assert!(s == "xy" || s == "y");
        }

        let gen = PatternGenerator::new("a^b", PatternSyntax::Regex, &cfg).unwrap();
        let err = gen.generate(&mut rng, 5, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternUnsatisfiable);

        let err = PatternGenerator::new(r"\bfoo", PatternSyntax::Regex, &cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaUnsupportedConstruct);
    }

    #[test]
    fn test_empty_class_is_unsatisfiable() {
        let err = PatternGenerator::xsd(r"a[^\s\S]", &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternUnsatisfiable);
        let gen = PatternGenerator::xsd(r"a[^\s\S]?", &config()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(gen.generate(&mut rng, 5, None).unwrap(), "a");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternGenerator::xsd("(ab", &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
    }

    #[test]
    fn test_as_gen() {
        let gen = PatternGenerator::xsd("[0-9]{4}", &config()).unwrap().to_gen();
        let (value, _) = gen.generate(3, super::super::RandomSource::from_seed(1));
        assert_eq!(value.unwrap().len(), 4);
    }
}
