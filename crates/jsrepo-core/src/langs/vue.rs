//! Vue single-file component plugin.

use super::markup::extract_component;
use super::{has_extension, Extraction, Language, LangError, LanguageOptions, PeerRequirement};
use crate::transform::ImportSyntax;

/// Vue single-file components (`<script>` and `<script setup>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Vue;

impl Language for Vue {
    fn name(&self) -> &'static str {
        "vue"
    }

    fn can_resolve_dependencies(&self, file_name: &str) -> bool {
        has_extension(file_name, &[".vue"])
    }

    fn extract_imports(
        &self,
        code: &str,
        _opts: &LanguageOptions,
    ) -> Result<Extraction, LangError> {
        extract_component(code, self.name(), true)
    }

    fn do_not_install(&self) -> &'static [&'static str] {
        &["vue", "nuxt"]
    }

    fn peer_requirement(&self) -> Option<PeerRequirement> {
        Some(PeerRequirement {
            package: "vue",
            feature: "Vue single-file components",
        })
    }

    fn import_syntaxes(&self) -> &'static [ImportSyntax] {
        &[ImportSyntax::Script, ImportSyntax::Markup]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langs::ImportKind;

    #[test]
    fn test_script_and_script_setup_are_unioned() {
        let source = r#"<script lang="ts">
import { defineComponent } from 'vue';
import shared from './shared';
</script>

<script setup lang="ts">
import shared from './shared';
import Button from './Button.vue';
import { format } from 'date-fns';
</script>

<template>
  <div :class="{ active: count < limit }">{{ count < 10 ? 'few' : 'many' }}</div>
  <Button />
</template>

<style scoped src="./card.css"></style>
"#;
        let out = Vue.extract_imports(source, &LanguageOptions::default()).unwrap();
        let raws: Vec<_> = out.imports.iter().map(|i| i.raw.as_str()).collect();
        assert_eq!(
            raws,
            vec!["vue", "./shared", "./Button.vue", "date-fns", "./card.css"]
        );
        assert_eq!(out.imports[2].line, 8);
        assert_eq!(out.imports[4].kind, ImportKind::MarkupSrc);
    }

    #[test]
    fn test_do_not_install() {
        assert!(Vue.do_not_install().contains(&"vue"));
        assert!(Vue.do_not_install().contains(&"nuxt"));
        assert_eq!(Vue.peer_requirement().unwrap().package, "vue");
    }
}
