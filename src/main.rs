fn main() {
    stephatility_lib::run()
}
