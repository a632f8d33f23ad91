//! Svelte component plugin.

use super::markup::extract_component;
use super::{has_extension, Extraction, Language, LangError, LanguageOptions, PeerRequirement};
use crate::transform::ImportSyntax;

/// Svelte components (instance and module `<script>` blocks).
#[derive(Debug, Clone, Copy, Default)]
pub struct Svelte;

impl Language for Svelte {
    fn name(&self) -> &'static str {
        "svelte"
    }

    fn can_resolve_dependencies(&self, file_name: &str) -> bool {
        has_extension(file_name, &[".svelte"])
    }

    fn extract_imports(
        &self,
        code: &str,
        _opts: &LanguageOptions,
    ) -> Result<Extraction, LangError> {
        extract_component(code, self.name(), true)
    }

    fn do_not_install(&self) -> &'static [&'static str] {
        &["svelte", "@sveltejs/kit"]
    }

    fn peer_requirement(&self) -> Option<PeerRequirement> {
        Some(PeerRequirement {
            package: "svelte",
            feature: "Svelte components",
        })
    }

    fn import_syntaxes(&self) -> &'static [ImportSyntax] {
        &[ImportSyntax::Script, ImportSyntax::Markup]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_and_instance_scripts() {
        let source = r#"<script context="module" lang="ts">
    export { helper } from './helper';
</script>

<script lang="ts">
    import { onMount } from 'svelte';
    import { page } from '$app/stores';
    import { cn } from '$lib/utils';
    import Icon from './Icon.svelte';
    let { open = false } = $props();
</script>

{#if open && items.length < 3}
    <Icon {open} on:click={() => (open = !open)} />
{/if}
"#;
        let out = Svelte
            .extract_imports(source, &LanguageOptions::default())
            .unwrap();
        let raws: Vec<_> = out.imports.iter().map(|i| i.raw.as_str()).collect();
        assert_eq!(
            raws,
            vec!["./helper", "svelte", "$app/stores", "$lib/utils", "./Icon.svelte"]
        );
    }

    #[test]
    fn test_unterminated_script_fails() {
        let err = Svelte
            .extract_imports("<script>\nimport x from './x';", &LanguageOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "LANG_PARSE_FAILED");
    }

    #[test]
    fn test_do_not_install() {
        assert_eq!(Svelte.do_not_install(), &["svelte", "@sveltejs/kit"]);
    }
}
