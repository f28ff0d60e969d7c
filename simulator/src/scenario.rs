//! Simulation scenarios.

use std::path::Path;

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tokenvault_common::{Amount, Payment, Ratio, Rounding, TokenId};
use tokenvault_ledger::Operation;

/// One unit of work to run against a fresh ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Payments the call receives; the ledger opens with these.
    #[serde(default)]
    pub incoming: Vec<Payment>,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Apply an operation; a ledger error aborts the unit of work.
    Apply(Operation),
    /// Take a fee expressed as a decimal fraction, e.g. `0.003`.
    TakeFee {
        token: TokenId,
        rate: Decimal,
        #[serde(default)]
        rounding: Rounding,
    },
    /// Apply an operation that must be rejected.
    ExpectFailure(Operation),
    /// Check a single balance.
    AssertBalance { token: TokenId, amount: Amount },
    /// Check the full settlement list, in order.
    AssertSettlement(Vec<Payment>),
}

const BUILTIN: &[&str] = &[
    "basic-settlement",
    "percentage-fee",
    "drain-and-redeposit",
    "insufficient-balance",
];

impl Scenario {
    /// Names accepted by [`Scenario::load`].
    pub fn builtin_names() -> &'static [&'static str] {
        BUILTIN
    }

    /// Load a built-in scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "basic-settlement" => Ok(Self::basic_settlement()),
            "percentage-fee" => Ok(Self::percentage_fee()),
            "drain-and-redeposit" => Ok(Self::drain_and_redeposit()),
            "insufficient-balance" => Ok(Self::insufficient_balance()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read scenario {}: {}", path.display(), e))?;
        let scenario = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid scenario {}: {}", path.display(), e))?;
        Ok(scenario)
    }

    /// Generate a random unit of work over a pool of `max_tokens` tokens.
    ///
    /// An empty pool yields a unit of work with no payments and no steps.
    pub fn random(rng: &mut impl Rng, index: usize, max_tokens: usize, max_steps: usize) -> Self {
        let pool: Vec<TokenId> = (0..max_tokens).map(pool_token).collect();
        let max_steps = if pool.is_empty() { 0 } else { max_steps };
        let pick = |rng: &mut dyn rand::RngCore| pool[rng.gen_range(0..pool.len())].clone();

        let incoming = (0..rng.gen_range(0..=max_tokens))
            .map(|_| Payment::new(pick(rng), rng.gen_range(1..=1_000_000u64)))
            .collect();

        let steps = (0..rng.gen_range(0..=max_steps))
            .map(|_| {
                let token = pick(rng);
                let op = match rng.gen_range(0..4) {
                    0 => Operation::Deposit {
                        token,
                        amount: rng.gen_range(0..10_000u64).into(),
                    },
                    1 => Operation::Withdraw {
                        token,
                        amount: rng.gen_range(0..=200_000u64).into(),
                    },
                    2 => Operation::WithdrawPercentage {
                        token,
                        ratio: Ratio::from_ppm(rng.gen_range(0..=1_000_000)),
                        rounding: if rng.gen_bool(0.5) {
                            Rounding::Down
                        } else {
                            Rounding::Up
                        },
                    },
                    _ => Operation::WithdrawAll { token },
                };
                ScenarioStep::Apply(op)
            })
            .collect();

        Self {
            name: format!("random-{index}"),
            description: "Generated unit of work".to_string(),
            incoming,
            steps,
        }
    }

    /// Two tokens in, one fully withdrawn, the other settled.
    fn basic_settlement() -> Self {
        Self {
            name: "basic-settlement".to_string(),
            description: "Credit, top up, drain one token and settle the rest".to_string(),
            incoming: vec![Payment::new(wegld(), 100u64)],
            steps: vec![
                ScenarioStep::Apply(Operation::Deposit {
                    token: usdc(),
                    amount: Amount::from(50u64),
                }),
                ScenarioStep::Apply(Operation::Deposit {
                    token: wegld(),
                    amount: Amount::from(25u64),
                }),
                ScenarioStep::AssertBalance {
                    token: wegld(),
                    amount: Amount::from(125u64),
                },
                ScenarioStep::AssertSettlement(vec![
                    Payment::new(wegld(), 125u64),
                    Payment::new(usdc(), 50u64),
                ]),
                ScenarioStep::Apply(Operation::Withdraw {
                    token: wegld(),
                    amount: Amount::from(125u64),
                }),
                ScenarioStep::AssertSettlement(vec![Payment::new(usdc(), 50u64)]),
            ],
        }
    }

    /// Proportional fee with floor rounding.
    fn percentage_fee() -> Self {
        Self {
            name: "percentage-fee".to_string(),
            description: "Take a 20% fee and settle the remainder".to_string(),
            incoming: vec![Payment::new(usdc(), 50u64)],
            steps: vec![
                ScenarioStep::TakeFee {
                    token: usdc(),
                    rate: Decimal::new(2, 1),
                    rounding: Rounding::Down,
                },
                ScenarioStep::AssertBalance {
                    token: usdc(),
                    amount: Amount::from(40u64),
                },
                // 0.3% of 40 is dust and leaves the balance alone
                ScenarioStep::TakeFee {
                    token: usdc(),
                    rate: Decimal::new(3, 3),
                    rounding: Rounding::Down,
                },
                ScenarioStep::AssertSettlement(vec![Payment::new(usdc(), 40u64)]),
            ],
        }
    }

    /// A drained token re-enters at the back of the settlement order.
    fn drain_and_redeposit() -> Self {
        Self {
            name: "drain-and-redeposit".to_string(),
            description: "Drain the first token, deposit it again, check order".to_string(),
            incoming: vec![
                Payment::new(wegld(), 10u64),
                Payment::new(usdc(), 20u64),
                Payment::new(mex(), 30u64),
            ],
            steps: vec![
                ScenarioStep::Apply(Operation::Withdraw {
                    token: usdc(),
                    amount: Amount::from(5u64),
                }),
                ScenarioStep::AssertSettlement(vec![
                    Payment::new(wegld(), 10u64),
                    Payment::new(usdc(), 15u64),
                    Payment::new(mex(), 30u64),
                ]),
                ScenarioStep::Apply(Operation::WithdrawAll { token: wegld() }),
                ScenarioStep::Apply(Operation::Deposit {
                    token: wegld(),
                    amount: Amount::from(1u64),
                }),
                ScenarioStep::AssertSettlement(vec![
                    Payment::new(usdc(), 15u64),
                    Payment::new(mex(), 30u64),
                    Payment::new(wegld(), 1u64),
                ]),
            ],
        }
    }

    /// Over-withdrawal aborts the call and refunds the incoming payments.
    fn insufficient_balance() -> Self {
        Self {
            name: "insufficient-balance".to_string(),
            description: "Rejected withdrawals; the last one aborts the call".to_string(),
            incoming: vec![Payment::new(usdc(), 10u64)],
            steps: vec![
                ScenarioStep::ExpectFailure(Operation::Withdraw {
                    token: mex(),
                    amount: Amount::from(1u64),
                }),
                ScenarioStep::Apply(Operation::Withdraw {
                    token: usdc(),
                    amount: Amount::from(0u64),
                }),
                ScenarioStep::AssertBalance {
                    token: usdc(),
                    amount: Amount::from(10u64),
                },
                ScenarioStep::Apply(Operation::Withdraw {
                    token: usdc(),
                    amount: Amount::from(11u64),
                }),
            ],
        }
    }
}

fn pool_token(i: usize) -> TokenId {
    TokenId::new(format!("TKN{i}-{i:06x}"))
}

fn wegld() -> TokenId {
    TokenId::new("WEGLD-bd4d79")
}

fn usdc() -> TokenId {
    TokenId::new("USDC-c76f1f")
}

fn mex() -> TokenId {
    TokenId::new("MEX-455c57")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_load_builtins() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("nope").is_err());
    }

    #[test]
    fn test_builtin_tokens_are_valid() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::load(name).unwrap();
            assert!(scenario.incoming.iter().all(|p| p.token.is_valid()));
        }
    }

    #[test]
    fn test_json_format() {
        let json = r#"{
            "name": "fee-then-payout",
            "incoming": [{"token": "WEGLD-bd4d79", "amount": "1000"}],
            "steps": [
                {"take_fee": {"token": "WEGLD-bd4d79", "rate": "0.003"}},
                {"apply": {"op": "withdraw", "token": "WEGLD-bd4d79", "amount": "500"}},
                {"assert_balance": {"token": "WEGLD-bd4d79", "amount": "497"}}
            ]
        }"#;

        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert_eq!(scenario.incoming.len(), 1);
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(
            &scenario.steps[0],
            ScenarioStep::TakeFee { rounding: Rounding::Down, .. }
        ));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("vault-sim-{}.json", std::process::id()));
        let scenario = Scenario::load("percentage-fee").unwrap();
        std::fs::write(&path, serde_json::to_string(&scenario).unwrap()).unwrap();

        let loaded = Scenario::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.name, "percentage-fee");
        assert_eq!(loaded.steps.len(), scenario.steps.len());
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Scenario::random(&mut StdRng::seed_from_u64(7), 0, 3, 10);
        let b = Scenario::random(&mut StdRng::seed_from_u64(7), 0, 3, 10);

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert!(a.incoming.iter().all(|p| p.token.is_valid()));
    }

    #[test]
    fn test_random_with_empty_pool() {
        let scenario = Scenario::random(&mut StdRng::seed_from_u64(1), 0, 0, 10);

        assert!(scenario.incoming.is_empty());
        assert!(scenario.steps.is_empty());
    }
}
