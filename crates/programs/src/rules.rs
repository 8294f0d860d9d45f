use std::fmt;
use std::str::FromStr;

use renderer::{UniformGroup, UniformState};

/// Outer-totalistic Life rule in B/S notation, e.g. `B3/S23`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    birth: [bool; 9],
    survive: [bool; 9],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule `{0}` must look like B3/S23")]
    Malformed(String),
    #[error("rule `{rule}` uses neighbour count {count}; counts run from 0 to 8")]
    Count { rule: String, count: char },
    #[error("rule `{rule}` lists the {part} part twice")]
    Duplicate { rule: String, part: char },
}

impl RuleSet {
    /// Conway's Game of Life.
    pub const CONWAY: RuleSet = RuleSet {
        birth: [false, false, false, true, false, false, false, false, false],
        survive: [false, false, true, true, false, false, false, false, false],
    };

    /// Parses `B<digits>/S<digits>` in either order, case-insensitive.
    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let trimmed = rule.trim();
        let mut parts = trimmed.split('/');
        let (Some(first), Some(second), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(RuleError::Malformed(rule.to_string()));
        };

        let mut birth = None;
        let mut survive = None;
        for part in [first, second] {
            let mut chars = part.chars();
            let tag = chars
                .next()
                .map(|c| c.to_ascii_uppercase())
                .ok_or_else(|| RuleError::Malformed(rule.to_string()))?;
            let slot = match tag {
                'B' => &mut birth,
                'S' => &mut survive,
                _ => return Err(RuleError::Malformed(rule.to_string())),
            };
            if slot.is_some() {
                return Err(RuleError::Duplicate {
                    rule: rule.to_string(),
                    part: tag,
                });
            }
            let mut counts = [false; 9];
            for c in chars {
                match c.to_digit(10) {
                    Some(n) if n <= 8 => counts[n as usize] = true,
                    _ => {
                        return Err(RuleError::Count {
                            rule: rule.to_string(),
                            count: c,
                        })
                    }
                }
            }
            *slot = Some(counts);
        }

        match (birth, survive) {
            (Some(birth), Some(survive)) => Ok(Self { birth, survive }),
            _ => Err(RuleError::Malformed(rule.to_string())),
        }
    }

    pub fn births(&self, neighbours: usize) -> bool {
        self.birth.get(neighbours).copied().unwrap_or(false)
    }

    pub fn survives(&self, neighbours: usize) -> bool {
        self.survive.get(neighbours).copied().unwrap_or(false)
    }

    /// Uniform encoding: entry `n` is `n` when the count applies, else -1.
    pub fn birth_uniform(&self) -> Vec<i32> {
        encode(&self.birth)
    }

    pub fn survive_uniform(&self) -> Vec<i32> {
        encode(&self.survive)
    }
}

fn encode(counts: &[bool; 9]) -> Vec<i32> {
    counts
        .iter()
        .enumerate()
        .map(|(n, set)| if *set { n as i32 } else { -1 })
        .collect()
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::CONWAY
    }
}

impl FromStr for RuleSet {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("B")?;
        for (n, set) in self.birth.iter().enumerate() {
            if *set {
                write!(f, "{n}")?;
            }
        }
        f.write_str("/S")?;
        for (n, set) in self.survive.iter().enumerate() {
            if *set {
                write!(f, "{n}")?;
            }
        }
        Ok(())
    }
}

impl UniformGroup for RuleSet {
    fn apply_to(&self, uniforms: &mut UniformState) {
        uniforms
            .uniform("s", self.survive_uniform())
            .uniform("b", self.birth_uniform());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conway() {
        let rule = RuleSet::parse("B3/S23").unwrap();
        assert_eq!(rule, RuleSet::CONWAY);
        assert_eq!(rule.survive_uniform(), vec![-1, -1, 2, 3, -1, -1, -1, -1, -1]);
        assert_eq!(rule.birth_uniform(), vec![-1, -1, -1, 3, -1, -1, -1, -1, -1]);
    }

    #[test]
    fn accepts_either_order_and_case() {
        assert_eq!(RuleSet::parse("s23/b3").unwrap(), RuleSet::CONWAY);
        let highlife: RuleSet = "B36/S23".parse().unwrap();
        assert!(highlife.births(6));
        assert!(!highlife.survives(6));
        assert_eq!(highlife.to_string(), "B36/S23");
    }

    #[test]
    fn empty_parts_are_allowed() {
        let seeds = RuleSet::parse("B2/S").unwrap();
        assert!(seeds.births(2));
        assert!((0..9).all(|n| !seeds.survives(n)));
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(matches!(RuleSet::parse("B3"), Err(RuleError::Malformed(_))));
        assert!(matches!(RuleSet::parse("B9/S23"), Err(RuleError::Count { count: '9', .. })));
        assert!(matches!(RuleSet::parse("B3/B2"), Err(RuleError::Duplicate { part: 'B', .. })));
        assert!(matches!(RuleSet::parse("X3/S23"), Err(RuleError::Malformed(_))));
    }
}
