//! Target profile selection.
//!
//! Each library is compiled for one board. The board is picked by an ordered
//! table of rules over the library's name and declared architectures; every
//! rule is evaluated and the *last* one that matches wins. If none match, the
//! default profile is used.

use derive_more::Display;
use libprobe_probe::TargetProfile;

pub const DEFAULT_PROFILE: &str = "arduino:avr:uno";
pub const DEFAULT_RULE: &str = "default";

type Condition = fn(&str, &[String]) -> bool;

pub struct Rule {
    pub label: &'static str,
    pub profile: &'static str,
    condition: Condition,
}
impl Rule {
    pub const fn new(label: &'static str, profile: &'static str, condition: Condition) -> Self {
        Self { label, profile, condition }
    }

    pub fn matches(&self, name: &str, architectures: &[String]) -> bool {
        (self.condition)(name, architectures)
    }
}

fn has_arch(architectures: &[String], wanted: &str) -> bool {
    architectures.iter().any(|arch| arch == wanted)
}

/// The profile picked for a library, and the rule that picked it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{profile} ({rule})")]
pub struct Selection {
    pub profile: TargetProfile,
    pub rule: &'static str,
}

pub struct ProfileTable {
    default: &'static str,
    rules: Vec<Rule>,
}
impl Default for ProfileTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROFILE,
            vec![
                Rule::new("avr", "arduino:avr:micro", |_, archs| has_arch(archs, "*") || has_arch(archs, "avr")),
                Rule::new("robot-control", "arduino:avr:robotControl", |name, _| {
                    name.contains("Robot") && name.contains("Control")
                }),
                Rule::new("robot-motor", "arduino:avr:robotMotor", |name, _| {
                    name.contains("Robot") && !name.contains("Control")
                }),
                Rule::new("circuit-playground", "arduino:avr:circuitplay32u4cat", |name, _| {
                    name.contains("Adafruit") && name.contains("Playground")
                }),
                Rule::new("sam", "arduino:sam:arduino_due_x_dbg", |_, archs| has_arch(archs, "sam")),
                Rule::new("samd", "arduino:samd:mkr1000", |_, archs| has_arch(archs, "samd")),
                Rule::new("arc32", "Intel:arc32:arduino_101", |_, archs| has_arch(archs, "arc32")),
                Rule::new(
                    "esp8266",
                    "esp8266:esp8266:nodemcuv2:CpuFrequency=80,UploadSpeed=115200,FlashSize=4M3M",
                    |_, archs| has_arch(archs, "esp8266"),
                ),
            ],
        )
    }
}
impl ProfileTable {
    pub fn new(default: &'static str, rules: Vec<Rule>) -> Self {
        Self { default, rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn select(&self, name: &str, architectures: &[String]) -> Selection {
        let (rule, profile) = self
            .rules
            .iter()
            .rev()
            .find(|rule| rule.matches(name, architectures))
            .map_or((DEFAULT_RULE, self.default), |rule| (rule.label, rule.profile));
        Selection { profile: TargetProfile::new(profile), rule }
    }
}
