//! Derive macros realizing SPEC_FULL.md §9's "struct tag reflection →
//! build-time + cache" design note: `#[derive(Input)]` and
//! `#[derive(Output)]` emit a `metadata()` function that builds a
//! `StructMetadata` exactly once (behind a `OnceLock`) and an `Input`/
//! `Output` trait impl that the request decoder and response writer call
//! without ever touching `std::any`/reflection at request time.
//!
//! Grounded on `cel-derive`'s attribute-parsing shape (`syn`/`quote`/
//! `proc-macro2`, one pass over fields building per-field codegen) and on
//! `mofa-macros`'s derive-crate layout (`proc-macro = true`, workspace
//! lints inherited).
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type, parse_macro_input};

#[proc_macro_derive(Input, attributes(schema, body, default, validate))]
pub fn derive_input(input: TokenStream) -> TokenStream {
	let ast = parse_macro_input!(input as DeriveInput);
	expand_input(ast).unwrap_or_else(|e| e.to_compile_error()).into()
}

#[proc_macro_derive(Output, attributes(schema, header))]
pub fn derive_output(input: TokenStream) -> TokenStream {
	let ast = parse_macro_input!(input as DeriveInput);
	expand_output(ast).unwrap_or_else(|e| e.to_compile_error()).into()
}

/// What one struct field's attributes say about it, still as raw strings —
/// the grammar itself (SPEC_FULL.md §4.1) is interpreted at runtime by
/// `metadata::FieldMetadata::from_tags`, not here, so this crate never has to
/// depend back on `apiruntime` (which depends on this crate).
struct RawFieldAttrs {
	schema: Option<String>,
	body: Option<String>,
	default: Option<String>,
	header: Option<String>,
	validate: Option<String>,
}

fn raw_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<RawFieldAttrs> {
	let mut out = RawFieldAttrs { schema: None, body: None, default: None, header: None, validate: None };
	for attr in attrs {
		let slot = if attr.path().is_ident("schema") {
			&mut out.schema
		} else if attr.path().is_ident("body") {
			&mut out.body
		} else if attr.path().is_ident("default") {
			&mut out.default
		} else if attr.path().is_ident("header") {
			&mut out.header
		} else if attr.path().is_ident("validate") {
			&mut out.validate
		} else {
			continue;
		};
		let lit: LitStr = attr.parse_args()?;
		*slot = Some(lit.value());
	}
	Ok(out)
}

fn opt_lit(o: &Option<String>) -> TokenStream2 {
	match o {
		Some(s) => quote! { Some(#s) },
		None => quote! { None },
	}
}

/// Field shape as seen by the unmarshaler: determines which `schema::convert_*`
/// helper the generated `from_map` body calls.
enum FieldShape {
	/// `BodyReader` (or `Option<BodyReader>`) — a streamed file/multipart part.
	Reader { optional: bool },
	/// A type the converter registry knows about directly (`bool`, `String`,
	/// integer/float families, `Vec<u8>`).
	Scalar,
	OptionScalar,
	VecScalar,
	/// Anything else: assumed to implement `Input` itself (a nested struct).
	Nested,
	OptionNested,
	VecNested,
}

const SCALAR_IDENTS: &[&str] =
	&["bool", "String", "str", "i8", "i16", "i32", "i64", "i128", "u8", "u16", "u32", "u64", "u128", "f32", "f64"];

fn last_segment_ident(ty: &Type) -> Option<String> {
	match ty {
		Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
		_ => None,
	}
}

fn generic_arg(ty: &Type) -> Option<&Type> {
	let Type::Path(p) = ty else { return None };
	let seg = p.path.segments.last()?;
	let PathArguments::AngleBracketed(args) = &seg.arguments else { return None };
	args.args.iter().find_map(|a| match a {
		GenericArgument::Type(t) => Some(t),
		_ => None,
	})
}

fn is_vec_u8(ty: &Type) -> bool {
	last_segment_ident(ty).as_deref() == Some("Vec")
		&& generic_arg(ty).and_then(last_segment_ident).as_deref() == Some("u8")
}

fn classify(ty: &Type) -> FieldShape {
	let ident = last_segment_ident(ty);
	if ident.as_deref() == Some("BodyReader") {
		return FieldShape::Reader { optional: false };
	}
	if ident.as_deref() == Some("Option") {
		let inner = generic_arg(ty);
		if inner.and_then(last_segment_ident).as_deref() == Some("BodyReader") {
			return FieldShape::Reader { optional: true };
		}
		return match inner {
			Some(inner) if is_vec_u8(inner) || SCALAR_IDENTS.contains(&last_segment_ident(inner).unwrap_or_default().as_str()) => {
				FieldShape::OptionScalar
			},
			_ => FieldShape::OptionNested,
		};
	}
	if is_vec_u8(ty) {
		return FieldShape::Scalar;
	}
	if ident.as_deref() == Some("Vec") {
		let inner = generic_arg(ty);
		return match inner {
			Some(inner) if SCALAR_IDENTS.contains(&last_segment_ident(inner).unwrap_or_default().as_str()) => {
				FieldShape::VecScalar
			},
			_ => FieldShape::VecNested,
		};
	}
	match ident.as_deref() {
		Some(s) if SCALAR_IDENTS.contains(&s) => FieldShape::Scalar,
		_ => FieldShape::Nested,
	}
}

fn expand_input(ast: DeriveInput) -> syn::Result<TokenStream2> {
	let name = &ast.ident;
	let Data::Struct(data) = &ast.data else {
		return Err(syn::Error::new_spanned(&ast, "#[derive(Input)] only supports structs"));
	};
	let Fields::Named(fields) = &data.fields else {
		return Err(syn::Error::new_spanned(&ast, "#[derive(Input)] requires named fields"));
	};

	let mut field_metadata_exprs = Vec::new();
	let mut from_map_stmts = Vec::new();
	let mut field_inits = Vec::new();
	let mut validate_stmts = Vec::new();
	let static_name = format_ident!("__{}_INPUT_METADATA", name.to_string().to_uppercase());

	for (index, field) in fields.named.iter().enumerate() {
		let field_ident = field.ident.clone().expect("named field");
		let field_name_str = field_ident.to_string();
		let ty = &field.ty;
		let type_name = quote!(#ty).to_string();
		let attrs = raw_field_attrs(&field.attrs)?;
		let schema = opt_lit(&attrs.schema);
		let body = opt_lit(&attrs.body);
		let default = opt_lit(&attrs.default);
		let validate = opt_lit(&attrs.validate);

		let shape = classify(ty);
		// Only a bare nested struct (or `Option` of one) needs `Value::Map`
		// at decode time; a `Vec` of nested structs is only ever addressed
		// via `deepObject`-repeated-map handling that decode.rs builds
		// itself from query pairs, not from this flag.
		let object_shaped = matches!(shape, FieldShape::Nested | FieldShape::OptionNested);

		field_metadata_exprs.push(quote! {
			apiruntime::metadata::FieldMetadata::from_tags(
				#field_name_str,
				#type_name,
				#index,
				false,
				#schema,
				#body,
				#default,
				None,
				#validate,
				#object_shaped,
			)
		});

		let map_key_expr = quote! { __meta.fields[#index].map_key };
		let path_expr = quote! { __meta.fields[#index].location_prefix() };
		let default_expr = quote! {
			__meta.fields[#index].default.map(apiruntime::schema::materialize_default)
		};
		let stmt = match shape {
			FieldShape::Scalar => quote! {
				let __v = __map.remove(#map_key_expr).or_else(|| #default_expr);
				let #field_ident = apiruntime::schema::convert_scalar(
					__v.unwrap_or(apiruntime::value::Value::Null),
					__registry,
					&#path_expr,
				)?;
			},
			FieldShape::OptionScalar => quote! {
				let __v = __map.remove(#map_key_expr).or_else(|| #default_expr);
				let #field_ident = apiruntime::schema::convert_option(__v, __registry, &#path_expr)?;
			},
			FieldShape::VecScalar => quote! {
				let __v = __map.remove(#map_key_expr).or_else(|| #default_expr);
				let #field_ident = apiruntime::schema::convert_vec(__v, __registry, &#path_expr)?;
			},
			FieldShape::Nested => quote! {
				let __v = __map.remove(#map_key_expr);
				let #field_ident = apiruntime::schema::convert_nested(__v, __registry, &#path_expr)?;
			},
			FieldShape::OptionNested => quote! {
				let __v = __map.remove(#map_key_expr);
				let #field_ident = apiruntime::schema::convert_nested_option(__v, __registry, &#path_expr)?;
			},
			FieldShape::VecNested => quote! {
				let __v = __map.remove(#map_key_expr);
				let #field_ident = apiruntime::schema::convert_nested_vec(__v, __registry, &#path_expr)?;
			},
			FieldShape::Reader { optional: false } => quote! {
				let __v = __map.remove(#map_key_expr);
				let #field_ident = apiruntime::schema::take_reader(__v, &#path_expr)?;
			},
			FieldShape::Reader { optional: true } => quote! {
				let __v = __map.remove(#map_key_expr);
				let #field_ident = match __v {
					None | Some(apiruntime::value::Value::Null) => None,
					Some(__inner) => Some(apiruntime::schema::take_reader(Some(__inner), &#path_expr)?),
				};
			},
		};
		from_map_stmts.push(stmt);
		field_inits.push(quote! { #field_ident });

		if let Some(rule) = &attrs.validate {
			validate_stmts.push(quote! {
				out.extend(apiruntime::validate::validate_field(&self.#field_ident, #rule, &__meta.fields[#index].location_prefix()));
			});
		}
	}

	Ok(quote! {
		impl apiruntime::schema::Input for #name {
			fn metadata() -> &'static apiruntime::metadata::StructMetadata {
				static #static_name: std::sync::OnceLock<apiruntime::metadata::StructMetadata> = std::sync::OnceLock::new();
				#static_name.get_or_init(|| {
					apiruntime::metadata::StructMetadata::new(
						stringify!(#name),
						vec![#(#field_metadata_exprs),*],
					)
				})
			}

			fn from_map(
				mut __map: std::collections::HashMap<String, apiruntime::value::Value>,
				__registry: &apiruntime::convert::ConverterRegistry,
			) -> Result<Self, apiruntime::schema::UnmarshalError> {
				let __meta = <Self as apiruntime::schema::Input>::metadata();
				#(#from_map_stmts)*
				Ok(Self { #(#field_inits),* })
			}

			fn validate(&self) -> Vec<apiruntime::problem::ErrorDetail> {
				let __meta = <Self as apiruntime::schema::Input>::metadata();
				let mut out = Vec::new();
				#(#validate_stmts)*
				out
			}
		}
	})
}

fn expand_output(ast: DeriveInput) -> syn::Result<TokenStream2> {
	let name = &ast.ident;
	let Data::Struct(data) = &ast.data else {
		return Err(syn::Error::new_spanned(&ast, "#[derive(Output)] only supports structs"));
	};
	let Fields::Named(fields) = &data.fields else {
		return Err(syn::Error::new_spanned(&ast, "#[derive(Output)] requires named fields"));
	};

	let mut field_metadata_exprs = Vec::new();
	let mut status_expr = quote! { None };
	let mut body_expr = quote! { apiruntime::response::BodyPayload::None };
	let mut header_exprs = Vec::new();
	let static_name = format_ident!("__{}_OUTPUT_METADATA", name.to_string().to_uppercase());

	for (index, field) in fields.named.iter().enumerate() {
		let field_ident = field.ident.clone().expect("named field");
		let field_name_str = field_ident.to_string();
		let ty = &field.ty;
		let type_name = quote!(#ty).to_string();
		let attrs = raw_field_attrs(&field.attrs)?;
		let schema = opt_lit(&attrs.schema);
		let header = opt_lit(&attrs.header);

		field_metadata_exprs.push(quote! {
			apiruntime::metadata::FieldMetadata::from_tags(
				#field_name_str,
				#type_name,
				#index,
				false,
				#schema,
				None,
				None,
				#header,
				None,
				false,
			)
		});

		if field_name_str == "status" {
			status_expr = quote! { apiruntime::response::IntoStatusOpt::into_status_opt(&self.#field_ident) };
		} else if field_name_str == "body" {
			body_expr = if is_vec_u8(ty) {
				quote! { apiruntime::response::BodyPayload::Raw(self.#field_ident.clone()) }
			} else {
				quote! {
					apiruntime::response::BodyPayload::Json(
						serde_json::to_value(&self.#field_ident).unwrap_or(serde_json::Value::Null),
					)
				}
			};
		} else if let Some(h) = &attrs.header {
			header_exprs.push(quote! {
				out.extend(apiruntime::response::IntoHeaderValues::into_header_values(#h, &self.#field_ident));
			});
		}
	}

	Ok(quote! {
		impl apiruntime::schema::Output for #name {
			fn metadata() -> &'static apiruntime::metadata::StructMetadata {
				static #static_name: std::sync::OnceLock<apiruntime::metadata::StructMetadata> = std::sync::OnceLock::new();
				#static_name.get_or_init(|| {
					apiruntime::metadata::StructMetadata::new(
						stringify!(#name),
						vec![#(#field_metadata_exprs),*],
					)
				})
			}

			fn status(&self) -> Option<u16> {
				#status_expr
			}

			fn headers(&self) -> Vec<(String, Vec<String>)> {
				let mut out: Vec<(String, Vec<String>)> = Vec::new();
				#(#header_exprs)*
				out
			}

			fn body(&self) -> apiruntime::response::BodyPayload {
				#body_expr
			}
		}
	})
}
