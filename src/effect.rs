#[derive(Clone, Debug)]
pub enum Effect {
    LoadEncounter { path: String },
    PlayStrikeSound { long_range: bool },
    PlaySummonSound,
}
