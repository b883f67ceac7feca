use thiserror::Error;

/// Board geometry and motion tuning.
///
/// Both clients of a match must use identical values, otherwise their
/// locally replayed cascades diverge.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Side of one grid cell (px)
    pub cell_size: f64,
    /// Rows and columns of the grid; also the number of pieces per team
    pub rows: u32,
    pub piece_radius: f64,
    /// Scales launch velocity into travel distance
    pub push_power: f64,
    /// Upper bound on motion legs driven by one `settle` call
    pub max_cascade_legs: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let cell_size = 50.0;
        Self {
            cell_size,
            rows: 8,
            piece_radius: cell_size / 2.0 - 5.0,
            push_power: 1.3,
            max_cascade_legs: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and > 0")]
    NotPositive { field: &'static str },
    #[error("piece_radius must leave room between neighbouring pieces (max {max})")]
    RadiusTooLarge { max: f64 },
    #[error("rows must be at least 2")]
    TooFewRows,
    #[error("invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

impl BoardConfig {
    /// Width and height of the playable grid
    pub fn board_size(&self) -> f64 {
        self.rows as f64 * self.cell_size
    }

    /// Lowest in-bounds coordinate on either axis (one cell of margin)
    pub fn min_coord(&self) -> f64 {
        self.cell_size
    }

    /// Highest in-bounds coordinate on either axis
    pub fn max_coord(&self) -> f64 {
        self.cell_size * (self.rows as f64 + 1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cell_size", self.cell_size),
            ("piece_radius", self.piece_radius),
            ("push_power", self.push_power),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        if self.rows < 2 {
            return Err(ConfigError::TooFewRows);
        }
        if self.piece_radius * 2.0 >= self.cell_size {
            return Err(ConfigError::RadiusTooLarge {
                max: self.cell_size / 2.0,
            });
        }
        if self.max_cascade_legs == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_cascade_legs",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_board_config_is_valid() {
        let config = BoardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.piece_radius, 20.0);
        assert_eq!(config.board_size(), 400.0);
        assert_eq!(config.min_coord(), 50.0);
        assert_eq!(config.max_coord(), 450.0);
    }

    #[test]
    fn oversized_radius_invalid() {
        let config = BoardConfig {
            piece_radius: 25.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RadiusTooLarge { .. })
        ));
    }

    #[test]
    fn non_finite_push_power_invalid() {
        let config = BoardConfig {
            push_power: f64::NAN,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "push_power"
            })
        );
    }

    #[test]
    fn single_row_invalid() {
        let config = BoardConfig {
            rows: 1,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TooFewRows));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&BoardConfig::default()).unwrap();
        assert!(json.contains("\"cellSize\":50.0"));
        assert!(json.contains("\"pushPower\":1.3"));
    }
}
