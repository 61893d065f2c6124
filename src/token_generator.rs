/*!
This module handles random generation of [`Token`]s from a typed registry of
kinds.
*/

use rand::{
    self,
    distr::{weighted::WeightedIndex, Distribution},
    Rng,
};

use crate::{GeneratorError, Token, Variant};

/// Handles the information of which token kinds to generate on a board.
///
/// The registry is a finite mapping from kind name to a generation entry,
/// validated once at board construction so an unknown or malformed kind
/// fails fast rather than at first use. To actually generate [`Token`]s,
/// the [`TokenGenerator::with_rng`] method needs to be used to yield a
/// [`WithRng`] that implements [`Iterator`].
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenGenerator {
    /// Uniformly random kind generator.
    Uniform {
        /// The kind names to sample from, equally likely.
        kinds: Vec<String>,
    },
    /// Weighted kind generator.
    ///
    /// Each entry carries a sampling weight and the value newly generated
    /// tokens of that kind start with.
    Weighted {
        /// The registered generation entries.
        entries: Vec<KindEntry>,
    },
}

/// One registered token kind with its sampling weight and token value.
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindEntry {
    /// The kind name; the match discriminant of generated tokens.
    pub kind: String,
    /// Relative sampling weight.
    pub weight: u32,
    /// Numeric weight generated tokens of this kind start with.
    pub value: u32,
}

impl TokenGenerator {
    /// Initialize an instance of the [`TokenGenerator::Uniform`] variant.
    pub fn uniform<S: Into<String>>(kinds: impl IntoIterator<Item = S>) -> Self {
        Self::Uniform {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    /// Initialize an instance of the [`TokenGenerator::Weighted`] variant.
    pub fn weighted(entries: impl IntoIterator<Item = KindEntry>) -> Self {
        Self::Weighted {
            entries: entries.into_iter().collect(),
        }
    }

    /// The registered kind names, in registry order.
    pub fn kinds(&self) -> Vec<&str> {
        match self {
            TokenGenerator::Uniform { kinds } => kinds.iter().map(String::as_str).collect(),
            TokenGenerator::Weighted { entries } => {
                entries.iter().map(|entry| entry.kind.as_str()).collect()
            }
        }
    }

    /// Checks the registry invariants: at least one kind, no empty or
    /// duplicate names, no zero weights.
    ///
    /// [`crate::BoardBuilder::build`] runs this before any token is
    /// generated; generation itself relies on these invariants.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        let kinds = self.kinds();
        if kinds.is_empty() {
            return Err(GeneratorError::NoKinds);
        }
        for (i, kind) in kinds.iter().enumerate() {
            if kind.is_empty() {
                return Err(GeneratorError::EmptyKind);
            }
            if kinds[..i].contains(kind) {
                return Err(GeneratorError::DuplicateKind(kind.to_string()));
            }
        }
        if let TokenGenerator::Weighted { entries } = self {
            if let Some(entry) = entries.iter().find(|entry| entry.weight == 0) {
                return Err(GeneratorError::ZeroWeight(entry.kind.clone()));
            }
        }
        Ok(())
    }

    /// Method that allows `TokenGenerator` to be used as [`Iterator`],
    /// generating tokens with the given variant hint.
    pub fn with_rng<'a, 'b, R: Rng>(&'a self, rng: &'b mut R, hint: Variant) -> WithRng<'a, 'b, R> {
        WithRng {
            token_generator: self,
            rng,
            hint,
        }
    }
}

impl Default for TokenGenerator {
    /// The standard four-kind uniform registry.
    fn default() -> Self {
        Self::uniform(["a", "b", "c", "d"])
    }
}

/// Struct produced from [`TokenGenerator::with_rng`] which implements
/// [`Iterator`].
pub struct WithRng<'a, 'b, R: Rng> {
    /// Selected token generator to use as information source.
    pub token_generator: &'a TokenGenerator,
    /// Random number generator for raw source of randomness.
    pub rng: &'b mut R,
    /// The variant hint stamped onto generated tokens.
    pub hint: Variant,
}

impl<R: Rng> Iterator for WithRng<'_, '_, R> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let (kind, value) = match self.token_generator {
            TokenGenerator::Uniform { kinds } => {
                if kinds.is_empty() {
                    return None;
                }
                (kinds[self.rng.random_range(0..kinds.len())].clone(), 1)
            }
            TokenGenerator::Weighted { entries } => {
                let weights = entries.iter().map(|entry| entry.weight);
                // SAFETY: Registry invariant, c.f. `TokenGenerator::validate`.
                let idx = WeightedIndex::new(weights).unwrap().sample(&mut self.rng);
                (entries[idx].kind.clone(), entries[idx].value)
            }
        };
        // SAFETY: Registry invariant, kind names are non-empty.
        let mut token = Token::new(kind).unwrap();
        token.variant = self.hint;
        token.value = value;
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> crate::BoardRng {
        crate::BoardRng::seed_from_u64(7)
    }

    #[test]
    fn uniform_generation_covers_registered_kinds() {
        let generator = TokenGenerator::uniform(["x", "y"]);
        let mut rng = rng();
        for token in generator.with_rng(&mut rng, Variant::Mundane).take(32) {
            assert!(["x", "y"].contains(&token.kind()));
            assert_eq!(token.variant(), Variant::Mundane);
            assert_eq!(token.value(), 1);
        }
    }

    #[test]
    fn weighted_generation_respects_entry_values() {
        let generator = TokenGenerator::weighted([KindEntry {
            kind: "gem".to_string(),
            weight: 3,
            value: 5,
        }]);
        let mut rng = rng();
        let token = generator.with_rng(&mut rng, Variant::Mundane).next().unwrap();
        assert_eq!(token.kind(), "gem");
        assert_eq!(token.value(), 5);
    }

    #[test]
    fn variant_hints_are_stamped_onto_tokens() {
        let generator = TokenGenerator::default();
        let mut rng = rng();
        let token = generator
            .with_rng(&mut rng, Variant::BombClear)
            .next()
            .unwrap();
        assert_eq!(token.variant(), Variant::BombClear);
    }

    #[test]
    fn validation_catches_malformed_registries() {
        assert_eq!(
            TokenGenerator::uniform(Vec::<String>::new()).validate(),
            Err(GeneratorError::NoKinds)
        );
        assert_eq!(
            TokenGenerator::uniform(["a", ""]).validate(),
            Err(GeneratorError::EmptyKind)
        );
        assert_eq!(
            TokenGenerator::uniform(["a", "a"]).validate(),
            Err(GeneratorError::DuplicateKind("a".to_string()))
        );
        let zero = TokenGenerator::weighted([KindEntry {
            kind: "a".to_string(),
            weight: 0,
            value: 1,
        }]);
        assert_eq!(zero.validate(), Err(GeneratorError::ZeroWeight("a".to_string())));
        assert_eq!(TokenGenerator::default().validate(), Ok(()));
    }
}
