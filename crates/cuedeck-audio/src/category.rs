//! Per-category gain table with a master pair composed on top.

use std::collections::HashMap;

use cuedeck_core::{CategoryOption, SoundCategory};

pub(crate) struct CategoryMixer {
    master: CategoryOption,
    categories: HashMap<SoundCategory, CategoryOption>,
}

impl CategoryMixer {
    pub(crate) fn new() -> Self {
        Self {
            master: CategoryOption::default(),
            categories: SoundCategory::ALL
                .into_iter()
                .map(|category| (category, CategoryOption::default()))
                .collect(),
        }
    }

    pub(crate) fn get(&self, category: SoundCategory) -> CategoryOption {
        self.categories
            .get(&category)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set(&mut self, category: SoundCategory, option: CategoryOption) {
        self.categories.insert(category, option);
    }

    pub(crate) fn master(&self) -> CategoryOption {
        self.master
    }

    pub(crate) fn set_master(&mut self, option: CategoryOption) {
        self.master = option;
    }

    /// The gain actually written to a voice:
    /// `cue × cat.user × cat.game × master.user × master.game`.
    pub(crate) fn composed_gain(&self, category: SoundCategory, cue_gain: f32) -> f32 {
        let cat = self.get(category);
        cue_gain * cat.user_gain * cat.game_gain * self.master.user_gain * self.master.game_gain
    }
}

#[cfg(test)]
mod tests {
    use cuedeck_core::{CategoryOption, SoundCategory};

    use super::CategoryMixer;

    #[test]
    fn composed_gain_multiplies_all_four_factors() {
        let mut mixer = CategoryMixer::new();
        mixer.set(
            SoundCategory::Sfx,
            CategoryOption {
                user_gain: 0.5,
                game_gain: 0.8,
            },
        );
        mixer.set_master(CategoryOption {
            user_gain: 0.9,
            game_gain: 0.7,
        });

        let expected = 0.6 * 0.5 * 0.8 * 0.9 * 0.7;
        assert_eq!(mixer.composed_gain(SoundCategory::Sfx, 0.6), expected);
    }

    #[test]
    fn categories_default_to_unity() {
        let mixer = CategoryMixer::new();
        assert_eq!(mixer.composed_gain(SoundCategory::Music, 1.0), 1.0);
    }
}
