use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Pat};

/// Times a movement system when the `perf_stats` feature is enabled.
///
/// The function body is wrapped in a drop guard that reports the elapsed time
/// through bevy's `info!` once the body returns. Without `perf_stats` the
/// guard is not emitted at all.
///
/// A parameter named `tick` of type `Res<MoveTick>` is picked up
/// automatically; when present, every 100th tick is reported regardless of
/// duration so slow drifts stay visible in the log.
///
/// ```ignore
/// #[profile(2)] // report above 2ms
/// pub fn step_movement(mut engine: ResMut<MoveEngine>, tick: Res<MoveTick>) {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        attr.to_string().trim().parse().unwrap_or(1)
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let has_tick_param = sig.inputs.iter().any(|arg| {
        let FnArg::Typed(pat_type) = arg else {
            return false;
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return false;
        };
        let ty = &pat_type.ty;
        pat_ident.ident == "tick" && quote!(#ty).to_string().contains("MoveTick")
    });

    let guard = if has_tick_param {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
                tick: u64,
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms || self.tick % 100 == 0 {
                        bevy::prelude::info!("[PERF] {} tick {}: {:?}", self.name, self.tick, elapsed);
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
                tick: tick.0,
            }
        }
    } else {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms {
                        bevy::prelude::info!("[PERF] {}: {:?}", self.name, elapsed);
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
            }
        }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_guard = {
                #guard
            };

            #block
        }
    };

    output.into()
}
