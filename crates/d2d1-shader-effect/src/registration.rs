//! Registering a shader type as a Direct2D effect class.
//!
//! `RegisterEffectFromString` takes three things: an XML description of the
//! effect's metadata, inputs and properties; one property binding per
//! custom property; and a factory. [`EffectRegistration`] builds all three
//! from a shader's [`ShaderDescriptor`] and keeps the UTF-16 buffers the
//! bindings point into alive for as long as it exists.

use std::fmt::{self, Write as _};

use anyhow::{bail, Context, Result};
use d2d1_abi::ffi::{D2D1_PROPERTY_BINDING, PD2D1_EFFECT_FACTORY};
use d2d1_abi::interfaces::ID2D1Factory1;
use d2d1_abi::{logging, ComPtr, Guid};
use tracing::{debug, info};

use crate::compute::{create_compute_effect, Compute};
use crate::descriptor::{ComputeShader, PixelShader, ShaderDescriptor};
use crate::pixel::{create_pixel_effect, Pixel};
use crate::properties::{property_accessors, CONSTANT_BUFFER};
use crate::shell::ShellKind;

/// Everything needed to register one shader type with a factory.
pub struct EffectRegistration {
    class_id: Guid,
    display_name: String,
    xml: Vec<u16>,
    property_names: Vec<Vec<u16>>,
    bindings: Vec<D2D1_PROPERTY_BINDING>,
    factory: PD2D1_EFFECT_FACTORY,
}

impl EffectRegistration {
    pub fn for_pixel_shader<S: PixelShader>() -> Result<Self> {
        Self::build::<Pixel>(
            S::descriptor(),
            std::any::type_name::<S>(),
            create_pixel_effect::<S>,
        )
    }

    pub fn for_compute_shader<S: ComputeShader>() -> Result<Self> {
        Self::build::<Compute>(
            S::descriptor(),
            std::any::type_name::<S>(),
            create_compute_effect::<S>,
        )
    }

    fn build<K: ShellKind>(
        descriptor: &ShaderDescriptor,
        type_name: &str,
        factory: PD2D1_EFFECT_FACTORY,
    ) -> Result<Self> {
        descriptor
            .validate()
            .with_context(|| format!("invalid shader descriptor for {type_name}"))?;

        let display_name = match descriptor.metadata.display_name {
            "" => type_name.rsplit("::").next().unwrap_or(type_name).to_string(),
            name => name.to_string(),
        };
        let accessors = property_accessors::<K>(descriptor);
        let names: Vec<&str> = accessors.iter().map(|a| a.name.as_str()).collect();
        let xml = effect_xml(descriptor, &display_name, &names)
            .with_context(|| format!("cannot describe effect {display_name}"))?;

        let property_names: Vec<Vec<u16>> = names.iter().map(|name| to_wide(name)).collect();
        let bindings = accessors
            .iter()
            .zip(&property_names)
            .map(|(accessor, name)| D2D1_PROPERTY_BINDING {
                propertyName: name.as_ptr(),
                setFunction: Some(accessor.set),
                getFunction: Some(accessor.get),
            })
            .collect();

        debug!(effect = %display_name, kind = K::NAME, "effect registration built");
        Ok(Self {
            class_id: descriptor.id,
            display_name,
            xml: to_wide(&xml),
            property_names,
            bindings,
            factory,
        })
    }

    pub fn class_id(&self) -> Guid {
        self.class_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The registration XML, without the trailing NUL.
    pub fn xml(&self) -> String {
        let end = self.xml.len().saturating_sub(1);
        String::from_utf16_lossy(&self.xml[..end])
    }

    pub fn property_names(&self) -> impl Iterator<Item = String> + '_ {
        self.property_names.iter().map(|name| {
            let end = name.len().saturating_sub(1);
            String::from_utf16_lossy(&name[..end])
        })
    }

    pub fn bindings(&self) -> &[D2D1_PROPERTY_BINDING] {
        &self.bindings
    }

    pub fn factory(&self) -> PD2D1_EFFECT_FACTORY {
        self.factory
    }

    /// Register the effect class with `factory`.
    pub fn register(&self, factory: &ComPtr<ID2D1Factory1>) -> Result<()> {
        if let Err(err) = logging::init() {
            debug!(%err, "logging not installed");
        }
        // SAFETY: `xml` and every binding name are NUL-terminated buffers
        // owned by `self`.
        unsafe {
            factory.register_effect_from_string(
                &self.class_id,
                &self.xml,
                &self.bindings,
                self.factory,
            )
        }
        .with_context(|| format!("RegisterEffectFromString failed for {}", self.display_name))?;
        info!(effect = %self.display_name, class_id = %self.class_id, "effect registered");
        Ok(())
    }

    pub fn unregister(&self, factory: &ComPtr<ID2D1Factory1>) -> Result<()> {
        factory
            .unregister_effect(&self.class_id)
            .with_context(|| format!("UnregisterEffect failed for {}", self.display_name))?;
        debug!(effect = %self.display_name, "effect unregistered");
        Ok(())
    }
}

impl fmt::Debug for EffectRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistration")
            .field("class_id", &self.class_id)
            .field("display_name", &self.display_name)
            .field("properties", &self.property_names().collect::<Vec<_>>())
            .finish()
    }
}

fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(Some(0)).collect()
}

/// Escape `value` for an XML attribute. Control characters other than
/// whitespace cannot be represented in XML 1.0 and are rejected.
fn escape_attribute(field: &str, value: &str) -> Result<String> {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c.is_control() => {
                bail!("{field} contains U+{:04X}, which XML cannot carry", c as u32)
            }
            c => escaped.push(c),
        }
    }
    Ok(escaped)
}

fn effect_xml(
    descriptor: &ShaderDescriptor,
    display_name: &str,
    properties: &[&str],
) -> Result<String> {
    let metadata = &descriptor.metadata;
    let mut xml = String::from("<?xml version='1.0'?>\n<Effect>\n");
    for (name, value) in [
        ("DisplayName", display_name),
        ("Author", metadata.author),
        ("Category", metadata.category),
        ("Description", metadata.description),
    ] {
        let value = escape_attribute(name, value)?;
        writeln!(xml, "    <Property name='{name}' type='string' value='{value}'/>")?;
    }

    if descriptor.input_count() == 0 {
        xml.push_str("    <Inputs/>\n");
    } else {
        xml.push_str("    <Inputs>\n");
        for index in 0..descriptor.input_count() {
            writeln!(xml, "        <Input name='Source{index}'/>")?;
        }
        xml.push_str("    </Inputs>\n");
    }

    for name in properties {
        let kind = if *name == CONSTANT_BUFFER { "blob" } else { "iunknown" };
        writeln!(xml, "    <Property name='{name}' type='{kind}'>")?;
        writeln!(xml, "        <Property name='DisplayName' type='string' value='{name}'/>")?;
        xml.push_str("    </Property>\n");
    }
    xml.push_str("</Effect>\n");
    Ok(xml)
}
