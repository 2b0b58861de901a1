use std::{fs::File, io::Write};

use anyhow::Result;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use serde::{Deserialize, Serialize};

fn main() -> Result<()> {
    // Regenerate if `opcodes.json` changes
    println!("cargo:rerun-if-changed=opcodes.json");

    let opcode_json: Vec<Opcode> = serde_json::from_slice(include_bytes!("./opcodes.json"))?;

    assert_eq!(45, opcode_json.len(), "Must have exactly 45 base opcodes");

    let syn_file = build_opcodes_file(&opcode_json)?;
    let mut file = File::create("./src/opcodes.rs")?;

    write!(file, "{}", prettyplease::unparse(&syn_file))?;

    Ok(())
}

fn build_opcodes_file(opcodes: &[Opcode]) -> Result<syn::File> {
    Ok(syn::File {
        shebang: None,
        attrs: vec![],
        items: vec![
            syn::parse2(build_enum(opcodes))?,
            syn::parse2(build_from(opcodes))?,
            syn::parse2(build_display(opcodes))?,
            syn::parse2(build_class_enum())?,
            syn::parse2(build_operand_class(opcodes))?,
        ],
    })
}

fn build_enum(opcodes: &[Opcode]) -> TokenStream {
    let variants = opcodes.iter().map(|op| {
        let id = format_ident!("{}", op.id);
        let opcode = op.opcode;

        quote! { #id = #opcode }
    });

    quote! {
        /// One of the 45 distinct instruction-character values this machine family decodes.
        ///
        /// `optbl`'s roughly eighty named verbs collapse onto these 45 characters: several
        /// external mnemonics (`TSL`, `TAA`..`TNS`, `TLU`, `LIP`, ...) share a base [`Opcode`]
        /// here and are distinguished at dispatch time by the register-select sub-field rather
        /// than by a separate variant — see [`OperandClass::Control`]. Only a subset of those
        /// sub-op dispatches are implemented in the executor; see its control-verb match arms for
        /// which ones.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            #(#variants),*
        }
    }
}

fn build_from(opcodes: &[Opcode]) -> TokenStream {
    let arms = opcodes.iter().map(|op| {
        let id = format_ident!("{}", op.id);
        let opcode = op.opcode;

        quote! { #opcode => Some(Self::#id) }
    });

    let count = opcodes.len() as u8;

    quote! {
        impl Opcode {
            /// Number of distinct base opcodes assigned in this machine family.
            pub const COUNT: u8 = #count;

            /// Decode a raw instruction-character value into an [`Opcode`], or `None` if the
            /// value has no verb assigned (the executor must raise the instruction flag).
            pub fn try_from_u8(opcode: u8) -> Option<Self> {
                match opcode {
                    #(#arms,)*
                    _ => None,
                }
            }
        }
    }
}

fn build_display(opcodes: &[Opcode]) -> TokenStream {
    let arms = opcodes.iter().map(|op| {
        let id = format_ident!("{}", op.id);
        let mnemonic = &op.mnemonic;

        quote! { Self::#id => #mnemonic }
    });

    quote! {
        impl std::fmt::Display for Opcode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", match self {
                    #(#arms),*
                })
            }
        }
    }
}

fn build_class_enum() -> TokenStream {
    quote! {
        /// How an instruction's register-select field (the fourth and fifth instruction
        /// characters' low nibbles) is interpreted for a given base [`Opcode`].
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        pub enum OperandClass {
            /// The field selects an accumulator-storage-unit; 0 selects the A (or B) accumulator.
            Asu,
            /// The field hosts a sub-op: a family of related verbs riding one base opcode
            /// (e.g. `CTL2` register `0o16` is `TIP`). Sub-op behavior, where implemented, is
            /// hand-written in the executor's control-verb match arms; this table only records
            /// that the field means "sub-op" rather than "ASU" for this base opcode.
            Control,
            /// The field must be zero; the verb takes no register operand.
            Plain,
        }
    }
}

fn build_operand_class(opcodes: &[Opcode]) -> TokenStream {
    let arms = opcodes.iter().map(|op| {
        let id = format_ident!("{}", op.id);
        let class = format_ident!("{}", op.class);

        quote! { Opcode::#id => OperandClass::#class }
    });

    quote! {
        /// Look up how to interpret the register-select field for a given [`Opcode`].
        pub fn operand_class(op: Opcode) -> OperandClass {
            match op {
                #(#arms),*
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
struct Opcode {
    opcode: u8,
    id: String,
    mnemonic: String,
    class: String,
}
