use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Battery sizing verdict for one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum BatteryDayClass {
    #[strum(to_string = "Oversized/Idle")]
    OversizedIdle,
    #[strum(to_string = "Balanced")]
    Balanced,
    #[strum(to_string = "Undersized/High stress")]
    UndersizedHighStress,
}

impl BatteryDayClass {
    /// Number of classes the battery model scores
    pub const COUNT: usize = 3;

    pub fn id(&self) -> u8 {
        match self {
            Self::OversizedIdle => 0,
            Self::Balanced => 1,
            Self::UndersizedHighStress => 2,
        }
    }

    pub fn from_id(id: usize) -> Option<Self> {
        match id {
            0 => Some(Self::OversizedIdle),
            1 => Some(Self::Balanced),
            2 => Some(Self::UndersizedHighStress),
            _ => None,
        }
    }
}

/// Classified battery behaviour for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryDayResult {
    pub date: NaiveDate,
    /// 0 oversized/idle, 1 balanced, 2 undersized/high stress
    pub class_id: u8,
    pub class: BatteryDayClass,
    /// Stress score in [0, 1]
    pub stress: f64,
    /// Utilization score in [0, 1]
    pub utilization: f64,
}

impl BatteryDayResult {
    pub fn new(date: NaiveDate, class: BatteryDayClass, stress: f64, utilization: f64) -> Self {
        Self {
            date,
            class_id: class.id(),
            class,
            stress,
            utilization,
        }
    }

    pub fn label(&self) -> String {
        self.class.to_string()
    }
}
